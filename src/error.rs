//! Error taxonomy for timer operations.
//!
//! - [`TimerError`]: state-machine precondition or input violations. Raised
//!   by the pure engine before anything is written.
//! - [`AuthError`]: the bearer credential is missing or does not verify.
//! - [`ServiceError`]: what a request handler sees: a timer error, or a
//!   store failure that aborted the transaction.
//!
//! Every variant rejects the request as a whole. Operations run inside one
//! database transaction, so an error leaves no partial mutation behind.

use thiserror::Error;

/// Rejections produced by the timer state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    /// The requested transition is not allowed from the current state
    /// ("already running", "no active timer", ...).
    #[error("{0}")]
    Conflict(String),

    /// Malformed input, e.g. a countdown duration outside 1..=120 minutes.
    #[error("{0}")]
    Validation(String),
}

impl TimerError {
    pub fn conflict(message: impl Into<String>) -> Self {
        TimerError::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        TimerError::Validation(message.into())
    }
}

/// Identity resolution failures. Always fail closed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingCredential,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Errors surfaced by [`crate::session::TimerService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Timer(#[from] TimerError),

    /// The store failed mid-operation; the transaction was rolled back.
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Store(err.into())
    }
}
