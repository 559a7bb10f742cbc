//! Error types for Henry HQ

use thiserror::Error;

/// Result type alias using Henry HQ's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Henry HQ
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Gateway connection could not be established or dropped mid-call
    #[error("Gateway connection error: {0}")]
    Connection(String),

    /// Gateway rejected the connect handshake
    #[error("Gateway auth error: {0}")]
    Auth(String),

    /// Call deadline elapsed without a usable result
    #[error("Gateway timeout: {0}")]
    Timeout(String),

    /// Gateway explicitly rejected the request
    #[error("Gateway rejected request: {0}")]
    Request(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Timeout(_))
    }

    /// Check if error is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::Request(_))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Connection(err.to_string())
    }
}
