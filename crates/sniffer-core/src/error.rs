//! Core error types.

use thiserror::Error;

/// Errors that can occur in core operations.
///
/// Capture itself never fails; only loading configuration can.
#[derive(Debug, Error)]
pub enum CoreError {
    /// IO error (e.g., reading a configuration file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
