//! # Main — CLI Entry Point
//!
//! Routes subcommands to the HTTP server and to small administrative tasks
//! against the same database.
//!
//! ## Subcommands
//!
//! - `serve`: run the HTTP API (requires `JWT_SECRET`)
//! - `migrate`: apply the embedded schema
//! - `award`: print the payout breakdown for an elapsed time and level (offline)
//! - `level get|set`: read or assign a user's level
//! - `wallet`: print a user's coin balance
//!
//! ## Global Options
//!
//! - `--database-url` / `DATABASE_URL`: PostgreSQL connection.
//! - `--db-max-connections` / `DB_MAX_CONNECTIONS`: pool size (default 10).

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "brainbet", about = "Focus timer backend that pays coins for focused time")]
struct Cli {
    /// PostgreSQL connection URL (or set DATABASE_URL env var)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum pooled database connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 10)]
    db_max_connections: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Port to listen on
        #[arg(long, env = "PORT", default_value_t = 8000)]
        port: u16,
        /// HS256 secret used to verify bearer tokens
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        jwt_secret: Option<String>,
        /// Required `aud` claim, if tokens carry one
        #[arg(long, env = "JWT_AUDIENCE")]
        jwt_audience: Option<String>,
        /// Pay sessions that failed an attention check instead of forfeiting them
        #[arg(long, env = "BRAINBET_PAY_INVALIDATED_SESSIONS")]
        pay_invalidated_sessions: bool,
    },
    /// Create tables and indexes if missing
    Migrate,
    /// Print the payout for a session without touching the database
    Award {
        /// Focused seconds in the finished session
        #[arg(long)]
        elapsed_seconds: i64,
        /// User level
        #[arg(long, default_value_t = 1)]
        level: i32,
    },
    /// Read or assign user levels
    Level {
        #[command(subcommand)]
        action: LevelAction,
    },
    /// Print a user's coin balance
    Wallet {
        /// User id (JWT subject)
        #[arg(long)]
        user: String,
    },
}

#[derive(Subcommand)]
enum LevelAction {
    /// Show a user's level and multiplier
    Get {
        #[arg(long)]
        user: String,
    },
    /// Assign a user's level
    Set {
        #[arg(long)]
        user: String,
        #[arg(long, value_parser = clap::value_parser!(i32).range(1..))]
        level: i32,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // LOG_FORMAT=json for log shippers, human-readable on stderr otherwise
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve {
            port,
            jwt_secret,
            jwt_audience,
            pay_invalidated_sessions,
        } => cli::run_serve(
            &cli,
            *port,
            jwt_secret.as_deref(),
            jwt_audience.clone(),
            *pay_invalidated_sessions,
        ),
        Commands::Migrate => cli::run_migrate(&cli),
        Commands::Award {
            elapsed_seconds,
            level,
        } => cli::run_award(*elapsed_seconds, *level),
        Commands::Level { action } => cli::run_level(&cli, action),
        Commands::Wallet { user } => cli::run_wallet(&cli, user),
    }
}
