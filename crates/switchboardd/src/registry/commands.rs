//! Registry actor commands and errors.
//!
//! This module defines the message types for communicating with the
//! `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//!
//! All types are designed for async message passing and follow the
//! panic-free policy.

use switchboard_core::{PeerId, SessionKey};
use thiserror::Error;
use tokio::sync::oneshot;

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Bind a peer identity to a transport session, replacing any prior
    /// binding for that identity. A prior identity held by the same
    /// session is released in the same turn.
    ///
    /// Never fails: re-registration is the normal path for a
    /// reconnecting client. Responds with the displaced session, if any.
    Register {
        peer: PeerId,
        session: SessionKey,
        respond_to: oneshot::Sender<Option<SessionKey>>,
    },

    /// Resolve a peer identity to its current session.
    ///
    /// Responds `None` for unknown identities; that is an answer, not
    /// an error.
    LookupSession {
        peer: PeerId,
        respond_to: oneshot::Sender<Option<SessionKey>>,
    },

    /// Remove the binding for a peer identity.
    ///
    /// Idempotent; responds `false` when nothing was registered.
    Unregister {
        peer: PeerId,
        respond_to: oneshot::Sender<bool>,
    },

    /// Remove the binding that a transport session holds and respond with
    /// the freed identity.
    ///
    /// A stale session (already replaced by a newer registration for the
    /// same identity) resolves to `None` and evicts nothing.
    UnregisterBySession {
        session: SessionKey,
        respond_to: oneshot::Sender<Option<PeerId>>,
    },

    /// Snapshot of all currently registered peer identities, sorted.
    ///
    /// Diagnostics only; routing always re-resolves by identity at send
    /// time.
    ListPeers {
        respond_to: oneshot::Sender<Vec<PeerId>>,
    },
}

/// Errors that can occur when talking to the registry actor.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("registry channel closed")]
    ChannelClosed,
}
