//! # Timer Routes — Start, Pause, Stop, Query, Attention Checks
//!
//! Each handler resolves the caller, decodes an optional JSON body and runs
//! one [`crate::session::TimerService`] operation at `Utc::now()`. Bodies
//! are optional: an empty body means "all defaults". A body that is present
//! but not valid JSON for the route is a 400.
//!
//! Transition counters are bumped only after the operation committed.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

use super::middleware_auth::RequireUser;
use super::AppState;
use crate::session::Payout;
use crate::timer::DEFAULT_CHECK_WINDOW_SECONDS;

const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub(super) struct StartRequest {
    duration_minutes: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct StopRequest {
    cap_seconds: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct CheckStartRequest {
    window_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    limit: Option<i64>,
}

/// Decode an optional JSON body. Whitespace-only bodies count as empty.
fn parse_body<T: DeserializeOwned + Default>(state: &AppState, body: &Bytes) -> Result<T, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        state.metrics.record_rejection("validation");
        super::json_error(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
    })
}

fn record_payout(state: &AppState, payout: &Payout) {
    let cents = payout.award.earned_coins.cents();
    state
        .metrics
        .coins_awarded_cents
        .inc_by(u64::try_from(cents).unwrap_or(0));
    if payout.invalidated {
        state.metrics.sessions_invalidated.inc();
    }
}

/// `GET /api/timers/me`
pub(super) async fn handler_timer_state(
    State(state): State<Arc<AppState>>,
    RequireUser(user_id): RequireUser,
) -> Response {
    match state.service.state(&user_id, Utc::now()).await {
        Ok(view) => {
            if let Some(payout) = &view.payout {
                state.metrics.record_transition("autostop");
                record_payout(&state, payout);
            }
            Json(view).into_response()
        }
        Err(e) => super::service_error_response(&state, e),
    }
}

/// `POST /api/timers/start`
pub(super) async fn handler_timer_start(
    State(state): State<Arc<AppState>>,
    RequireUser(user_id): RequireUser,
    body: Bytes,
) -> Response {
    let req: StartRequest = match parse_body(&state, &body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match state
        .service
        .start(&user_id, req.duration_minutes, Utc::now())
        .await
    {
        Ok(view) => {
            state
                .metrics
                .record_transition(if view.resumed { "resume" } else { "start" });
            Json(view).into_response()
        }
        Err(e) => super::service_error_response(&state, e),
    }
}

/// `POST /api/timers/pause`
pub(super) async fn handler_timer_pause(
    State(state): State<Arc<AppState>>,
    RequireUser(user_id): RequireUser,
) -> Response {
    match state.service.pause(&user_id, Utc::now()).await {
        Ok(view) => {
            state.metrics.record_transition("pause");
            Json(view).into_response()
        }
        Err(e) => super::service_error_response(&state, e),
    }
}

/// `POST /api/timers/stop`
pub(super) async fn handler_timer_stop(
    State(state): State<Arc<AppState>>,
    RequireUser(user_id): RequireUser,
    body: Bytes,
) -> Response {
    let req: StopRequest = match parse_body(&state, &body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match state.service.stop(&user_id, req.cap_seconds, Utc::now()).await {
        Ok(view) => {
            state.metrics.record_transition("stop");
            record_payout(&state, &view.payout);
            Json(view).into_response()
        }
        Err(e) => super::service_error_response(&state, e),
    }
}

/// `POST /api/timers/check/start`
pub(super) async fn handler_check_start(
    State(state): State<Arc<AppState>>,
    RequireUser(user_id): RequireUser,
    body: Bytes,
) -> Response {
    let req: CheckStartRequest = match parse_body(&state, &body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let window = req.window_seconds.unwrap_or(DEFAULT_CHECK_WINDOW_SECONDS);
    match state
        .service
        .start_attention_check(&user_id, window, Utc::now())
        .await
    {
        Ok(view) => {
            state.metrics.record_transition("check_start");
            Json(view).into_response()
        }
        Err(e) => super::service_error_response(&state, e),
    }
}

/// `POST /api/timers/check/confirm`
pub(super) async fn handler_check_confirm(
    State(state): State<Arc<AppState>>,
    RequireUser(user_id): RequireUser,
) -> Response {
    match state
        .service
        .confirm_attention_check(&user_id, Utc::now())
        .await
    {
        Ok(view) => {
            state.metrics.record_transition("check_confirm");
            Json(view).into_response()
        }
        Err(e) => super::service_error_response(&state, e),
    }
}

/// `GET /api/timers/history?limit=N`: the caller's recent sessions, newest first.
pub(super) async fn handler_timer_history(
    State(state): State<Arc<AppState>>,
    RequireUser(user_id): RequireUser,
    Query(q): Query<HistoryQuery>,
) -> Response {
    let limit = q
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    match state.service.db().get_timer_history(&user_id, limit).await {
        Ok(rows) => Json(serde_json::json!({ "timers": rows })).into_response(),
        Err(e) => super::service_error_response(&state, e.into()),
    }
}
