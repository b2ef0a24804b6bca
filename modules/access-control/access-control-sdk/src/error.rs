//! Error types for the access control module.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to the console backend.
///
/// These represent infrastructure and authentication failures only.
/// A missing permission is expressed as `check(..) == false`, not as an error.
#[derive(Debug, Error)]
pub enum AccessControlError {
    /// The backend answered `401 Unauthorized`.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The backend answered with another non-success status.
    #[error("backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The request could not be sent or the response could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The backend refused the supplied credentials.
    #[error("login rejected: {0}")]
    LoginRejected(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AccessControlError {
    /// Whether the session token was rejected and the session must be dropped.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}
