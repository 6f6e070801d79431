//! Error types for session operations.

use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session expired: {0}")]
    Expired(String),

    /// Backend failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<SessionError> for mabs_core::Error {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Serialization(msg) | SessionError::Deserialization(msg) => {
                mabs_core::Error::Serialization(msg)
            }
            other => mabs_core::Error::Session(other.to_string()),
        }
    }
}
