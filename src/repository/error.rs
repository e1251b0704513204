//! Backend Errors

use thiserror::Error;

/// Result type for every backend call
pub type BackendResult<T> = Result<T, BackendError>;

/// Failures reported by the relational store, object storage or change feed
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("database error: {0}")]
    Database(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("permission denied: {0}")]
    Policy(String),

    #[error("not signed in")]
    Unauthenticated,

    #[error("realtime channel closed")]
    ChannelClosed,
}

impl From<rusqlite::Error> for BackendError {
    fn from(e: rusqlite::Error) -> Self {
        BackendError::Database(e.to_string())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => BackendError::Status {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None if e.is_decode() => BackendError::Decode(e.to_string()),
            None => BackendError::Transport(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Decode(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BackendError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        BackendError::Transport(e.to_string())
    }
}
