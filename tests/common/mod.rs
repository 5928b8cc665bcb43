//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use brainbet::db::Database;
use brainbet::identity::{Claims, Identity};
use brainbet::server::{self, AppState};
use brainbet::{RewardPolicy, TimerService};
use jsonwebtoken::{encode, EncodingKey, Header};
use tokio::sync::OnceCell;

pub const JWT_SECRET: &str = "brainbet-test-secret";

/// Returns the test database URL from the `TEST_DATABASE_URL` environment variable.
/// Panics if the variable is not set.
pub fn test_db_url() -> String {
    std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set for integration tests")
}

/// Returns true if the test database URL is configured.
pub fn has_test_db() -> bool {
    std::env::var("TEST_DATABASE_URL").is_ok()
}

static SCHEMA_INIT: OnceCell<()> = OnceCell::const_new();

/// Connect to the test database, applying the schema once per test binary.
///
/// Tests share the database without truncating it; each test works under its
/// own [`fresh_user`] id instead.
pub async fn setup_test_db() -> Database {
    let db = Database::connect(&test_db_url(), 5)
        .await
        .expect("Failed to connect to test database");
    SCHEMA_INIT
        .get_or_init(|| async {
            db.migrate().await.expect("Failed to apply schema");
        })
        .await;
    db
}

/// A user id no other test uses.
pub fn fresh_user() -> String {
    format!("user-{}", uuid::Uuid::new_v4())
}

pub async fn service(policy: RewardPolicy) -> TimerService {
    TimerService::new(setup_test_db().await, policy)
}

/// Mint a bearer token for `user_id` valid for an hour.
pub fn token_for(user_id: &str) -> String {
    let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
    encode(
        &Header::default(),
        &Claims {
            sub: user_id.to_string(),
            exp,
        },
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn app_with(db: Database) -> axum::Router {
    let state: Arc<AppState> = AppState::new(
        db,
        Identity::hs256(JWT_SECRET, None),
        RewardPolicy::default(),
    );
    server::build_router(state)
}

/// Build an Axum test app router connected to the test database.
pub async fn build_test_app() -> axum::Router {
    app_with(setup_test_db().await)
}

/// Build an app whose pool never connects unless a handler reaches the store.
/// Enough for auth, body-parsing and probe tests.
pub fn build_offline_app() -> axum::Router {
    let db = Database::connect_lazy("postgres://brainbet@127.0.0.1:1/brainbet_offline", 1)
        .expect("lazy pool");
    app_with(db)
}
