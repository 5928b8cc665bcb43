//! # Server — HTTP Surface for the Timer Engine
//!
//! Runs an Axum HTTP server exposing the timer operations to authenticated
//! users, plus health, readiness and Prometheus endpoints.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET | `/api/timers/me` | current state (may autostop an expired countdown) |
//! | POST | `/api/timers/start` | start or resume |
//! | POST | `/api/timers/pause` | pause |
//! | POST | `/api/timers/stop` | stop and pay out |
//! | POST | `/api/timers/check/start` | open an attention check window |
//! | POST | `/api/timers/check/confirm` | answer the attention check |
//! | GET | `/api/timers/history` | recent sessions |
//! | GET | `/api/users/me` | level, multiplier, balance |
//! | GET | `/healthz`, `/readyz`, `/metrics` | probes and scraping |
//!
//! Handlers are thin: resolve the user, call [`TimerService`] with
//! `Utc::now()`, map the result to JSON.

pub(crate) mod middleware_auth;
mod routes_health;
mod routes_timer;
mod routes_users;

use anyhow::Result;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Instrument};

use crate::db::Database;
use crate::error::{AuthError, ServiceError, TimerError};
use crate::identity::Identity;
use crate::prom_metrics;
use crate::session::{RewardPolicy, TimerService};

pub struct AppState {
    pub service: TimerService,
    pub identity: Identity,
    pub metrics: prom_metrics::Metrics,
}

impl AppState {
    pub fn new(db: Database, identity: Identity, policy: RewardPolicy) -> Arc<Self> {
        Arc::new(AppState {
            service: TimerService::new(db, policy),
            identity,
            metrics: prom_metrics::Metrics::new(),
        })
    }
}

/// Settings for [`run`].
pub struct ServeConfig {
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub jwt_audience: Option<String>,
    pub policy: RewardPolicy,
}

pub(super) fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Map a failed operation to its HTTP response and count the rejection.
pub(super) fn service_error_response(state: &AppState, err: ServiceError) -> Response {
    match err {
        ServiceError::Timer(TimerError::Conflict(msg)) => {
            state.metrics.record_rejection("conflict");
            json_error(StatusCode::CONFLICT, msg)
        }
        ServiceError::Timer(TimerError::Validation(msg)) => {
            state.metrics.record_rejection("validation");
            json_error(StatusCode::BAD_REQUEST, msg)
        }
        ServiceError::Store(e) => {
            state.metrics.record_rejection("store");
            warn!(error = %e, "timer operation failed in the store");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal storage error")
        }
    }
}

pub(super) fn auth_error_response(state: &AppState, err: AuthError) -> Response {
    state.metrics.record_rejection("auth");
    json_error(StatusCode::UNAUTHORIZED, err.to_string())
}

/// Middleware that records request duration into the Prometheus histogram,
/// generates (or propagates) a request ID for correlation, and wraps the
/// request in a tracing span.
async fn metrics_middleware(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = req.method().to_string();
    let raw_path = req.uri().path().to_string();
    let norm_path = normalize_path(&raw_path);
    let start = std::time::Instant::now();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %raw_path,
    );
    let mut response = next.run(req).instrument(span).await;

    state
        .metrics
        .http_request_duration
        .get_or_create(&prom_metrics::HttpLabel {
            method,
            path: norm_path,
        })
        .observe(start.elapsed().as_secs_f64());

    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Collapse numeric and UUID path segments into placeholders so the latency
/// histogram keeps a bounded label set.
///
/// No API route takes a path parameter, so this only affects unrouted
/// requests: scanners hitting `/api/timers/123` or `/users/<uuid>` would
/// otherwise mint a new label per URL.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if seg.is_empty() {
                seg.to_string()
            } else if seg.chars().all(|c| c.is_ascii_digit()) {
                ":id".to_string()
            } else if seg.len() == 36 && seg.chars().filter(|c| *c == '-').count() == 4 {
                ":uuid".to_string()
            } else {
                seg.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/timers/me", get(routes_timer::handler_timer_state))
        .route("/api/timers/start", post(routes_timer::handler_timer_start))
        .route("/api/timers/pause", post(routes_timer::handler_timer_pause))
        .route("/api/timers/stop", post(routes_timer::handler_timer_stop))
        .route(
            "/api/timers/check/start",
            post(routes_timer::handler_check_start),
        )
        .route(
            "/api/timers/check/confirm",
            post(routes_timer::handler_check_confirm),
        )
        .route(
            "/api/timers/history",
            get(routes_timer::handler_timer_history),
        )
        .route("/api/users/me", get(routes_users::handler_users_me))
        .route("/healthz", get(routes_health::handler_healthz))
        .route("/readyz", get(routes_health::handler_readyz))
        .route("/metrics", get(routes_health::handler_metrics))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CatchPanicLayer::new())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .with_state(state)
}

pub async fn run(config: ServeConfig) -> Result<()> {
    let database = Database::connect(&config.database_url, config.max_connections).await?;
    database.migrate().await?;

    let identity = Identity::hs256(&config.jwt_secret, config.jwt_audience.as_deref());
    let state = AppState::new(database, identity, config.policy);
    let app = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(
        port = config.port,
        pay_invalidated_sessions = config.policy.pay_invalidated_sessions,
        "brainbet server running"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("brainbet server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await.ok();
                info!("received SIGINT, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("received SIGINT, shutting down");
    }
}
