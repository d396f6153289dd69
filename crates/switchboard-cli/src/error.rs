//! Error types for the diagnostics client.

use thiserror::Error;

/// Errors raised by the relay client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to relay at {addr}: {error}")]
    Connect { addr: String, error: String },

    #[error("relay rejected attach: {0}")]
    Rejected(String),

    #[error("relay closed the connection")]
    Disconnected,

    #[error("unexpected frame from relay: {0}")]
    UnexpectedFrame(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
