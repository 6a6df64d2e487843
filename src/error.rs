//! Error types for the posture monitor
//!
//! Classification and debouncing are total and never produce these; errors
//! only come from the fallible edges (pose JSON, configuration, storage).

use thiserror::Error;

/// Errors that can occur outside the pure classification path
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Failed to parse pose payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Record store error: {0}")]
    StorageError(String),

    #[error("Thumbnail rendering failed: {0}")]
    ThumbnailError(String),
}
