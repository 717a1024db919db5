//! Error types for the client layer.

use thiserror::Error;

/// Client error type.
///
/// Errors produced by a transport reach the caller as the same value whether
/// or not the interceptor handled the request.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network error from reqwest (connect, TLS, timeout, body read).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The request could not be converted for the network.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Error raised by a custom transport.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The task driving the request went away before it produced a result.
    #[error("Request interrupted")]
    Interrupted,
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
