//! Domain errors for the access control module.

use access_control_sdk::AccessControlError;
use console_security::SessionError;
use thiserror::Error;

/// Errors raised while building the route tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteTreeError {
    #[error("duplicate route key '{key}'")]
    DuplicateKey { key: String },

    #[error("invalid route path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("route node '{key}' is malformed: {reason}")]
    InvalidNode { key: String, reason: String },

    #[error("route matcher rejected '{path}': {reason}")]
    Matcher { path: String, reason: String },
}

impl RouteTreeError {
    #[must_use]
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn invalid_node(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNode {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the login and logout flows.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error(transparent)]
    Backend(#[from] AccessControlError),

    #[error("session storage failed: {0}")]
    Session(#[from] SessionError),
}

impl DomainError {
    /// Message suitable for showing to the operator after a failed login.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend(AccessControlError::LoginRejected(message)) => message.clone(),
            Self::Backend(e) => e.to_string(),
            Self::Session(e) => format!("could not persist session: {e}"),
        }
    }
}
