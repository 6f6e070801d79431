// Error types for the Mabs framework

use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Service type mismatch for '{key}': expected {expected}")]
    ServiceTypeMismatch { key: String, expected: &'static str },

    #[error("Cannot edit locked container: {0}")]
    LockedContainer(String),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Invalid route pattern '{path}': {reason}")]
    InvalidRoute { path: String, reason: String },

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Listener error on '{event}': {message}")]
    Listener { event: String, message: String },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a handler error from anything displayable.
    pub fn handler(message: impl std::fmt::Display) -> Self {
        Error::Handler(message.to_string())
    }

    /// Build a listener error for the given event.
    pub fn listener(event: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Listener {
            event: event.into(),
            message: message.to_string(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST.as_u16(),
            Error::NotFound(_) => StatusCode::NOT_FOUND.as_u16(),
            // Everything else is a server-side failure.
            _ => StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result alias used across the framework.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::NotFound("x".into()).status_code(), 404);
        assert_eq!(Error::BadRequest("x".into()).status_code(), 400);
        assert_eq!(Error::handler("boom").status_code(), 500);
        assert_eq!(Error::LockedContainer("k".into()).status_code(), 500);
    }

    #[test]
    fn test_error_classes() {
        assert!(Error::BadRequest("x".into()).is_client_error());
        assert!(!Error::BadRequest("x".into()).is_server_error());
        assert!(Error::RouteNotFound("home".into()).is_server_error());
    }

    #[test]
    fn test_listener_error_display() {
        let err = Error::listener("mabs.on.boot", "nope");
        assert_eq!(err.to_string(), "Listener error on 'mabs.on.boot': nope");
    }
}
