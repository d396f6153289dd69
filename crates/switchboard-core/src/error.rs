//! Domain-specific error types following the panic-free policy.

use thiserror::Error;

/// Errors that can occur when interpreting identity tokens.
#[derive(Error, Debug, Clone)]
pub enum IdentityError {
    /// Peer identity has no parseable leading numeric segment.
    ///
    /// Callers skip the account-status side-effect and keep routing.
    #[error("malformed peer identity: {0}")]
    MalformedPeerId(String),
}
