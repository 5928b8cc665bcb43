//! Bearer-token authentication for the timer API.
//!
//! [`RequireUser`] resolves the `Authorization` header through the server's
//! [`crate::identity::Identity`] and hands the verified user id to the
//! handler. Requests without a valid token are rejected with 401 before any
//! timer state is touched.

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::response::Response;
use std::sync::Arc;

use super::AppState;

/// Axum extractor that requires an authenticated user.
pub struct RequireUser(pub String);

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let authorization = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        state
            .identity
            .resolve(authorization)
            .map(RequireUser)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected request credential");
                super::auth_error_response(state, e)
            })
    }
}
