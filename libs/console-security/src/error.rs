use thiserror::Error;

/// Errors raised by session persistence.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backing storage failed to read or write a key.
    #[error("session storage error: {0}")]
    Storage(String),

    /// A stored value could not be encoded or decoded.
    #[error("session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}
