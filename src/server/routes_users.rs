//! User profile: level, multiplier and wallet balance.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use super::middleware_auth::RequireUser;
use super::AppState;

/// `GET /api/users/me`. Creates the level and wallet rows on first call.
pub(super) async fn handler_users_me(
    State(state): State<Arc<AppState>>,
    RequireUser(user_id): RequireUser,
) -> Response {
    match state.service.profile(&user_id).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => super::service_error_response(&state, e),
    }
}
