//! # Database — PostgreSQL Storage Layer
//!
//! Durable storage for timers, wallets and levels via `sqlx::PgPool`.
//!
//! ## Schema
//!
//! - `timers`: one row per session; history is kept, never rewritten once stopped
//! - `timer_slots`: the explicit "current timer" pointer per user, also the
//!   per-user lock row
//! - `wallets`: coin balance in hundredths
//! - `user_levels`: level driving the payout multiplier
//!
//! A partial unique index on `timers (user_id) WHERE status <> 'stopped'`
//! backs the one-active-timer rule at the store level.
//!
//! ## Module Structure
//!
//! - [`timers`]: slot locking, current timer load, insert/update
//! - [`wallets`]: lazy wallet creation and atomic credit
//! - [`levels`]: lazy level creation and level administration
//!
//! Functions that take `&mut PgConnection` are meant to run inside the
//! caller's transaction; `Database` methods run standalone on the pool.

pub mod levels;
pub mod timers;
pub mod wallets;

use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

pub use timers::{CurrentTimer, TimerRow};

/// Embedded schema, applied idempotently by [`Database::migrate`].
const SCHEMA: &str = include_str!("../../migrations/001_timer_engine.sql");

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

/// Parse a PostgreSQL URL into connect options.
///
/// Parsed by hand to keep the full username intact; sqlx's built-in parser
/// strips the ".project-ref" suffix that pooled Postgres providers require.
fn connect_options(database_url: &str) -> Result<PgConnectOptions> {
    let url = url::Url::parse(database_url)?;
    let username = urlencoding::decode(url.username())?.into_owned();
    let password = url
        .password()
        .map(|p| urlencoding::decode(p).map(|s| s.into_owned()))
        .transpose()?;
    let mut opts = PgConnectOptions::new()
        .host(url.host_str().unwrap_or("localhost"))
        .port(url.port().unwrap_or(5432))
        .database(url.path().trim_start_matches('/'))
        .username(&username)
        .statement_cache_capacity(0);
    if let Some(ref pw) = password {
        opts = opts.password(pw);
    }
    Ok(opts)
}

impl Database {
    /// Connect to PostgreSQL, failing fast if the server is unreachable.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options(database_url)?)
            .await?;
        Ok(Database { pool })
    }

    /// Build a pool that opens connections on first use.
    pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy_with(connect_options(database_url)?);
        Ok(Database { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Health check: execute `SELECT 1` to verify database connectivity.
    ///
    /// Used by the `/readyz` readiness probe.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
