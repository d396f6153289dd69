//! Client interface for interacting with the `RegistryActor`.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending
//! commands to the registry actor. Every routing and lifecycle task
//! holds a clone; the actor serializes their operations.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use tokio::sync::{mpsc, oneshot};

use switchboard_core::{PeerId, SessionKey};

use super::commands::{RegistryCommand, RegistryError};

/// Handle for interacting with the registry actor.
///
/// Cheap to clone and shareable across tasks. All methods are async and
/// communicate with the actor via channels.
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Bind a peer identity to a session, replacing any prior binding.
    ///
    /// This is the normal path for a reconnecting client; it is never a
    /// conflict error. Returns the displaced session, if any.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register(
        &self,
        peer: PeerId,
        session: SessionKey,
    ) -> Result<Option<SessionKey>, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Register {
                peer,
                session,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Resolve a peer identity to its current session.
    ///
    /// Returns `None` for unknown identities or if communication with
    /// the actor fails; the caller's policy in both cases is to drop the
    /// message, so the distinction is not surfaced.
    pub async fn lookup_session(&self, peer: PeerId) -> Option<SessionKey> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::LookupSession {
                peer,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Remove the binding for a peer identity.
    ///
    /// Idempotent: `Ok(false)` means nothing was registered.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn unregister(&self, peer: PeerId) -> Result<bool, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Unregister {
                peer,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Remove the binding held by a session, returning the freed identity.
    ///
    /// `Ok(None)` covers both sessions that never announced presence and
    /// stale sessions already replaced by a newer registration; neither
    /// evicts anything.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn unregister_by_session(
        &self,
        session: SessionKey,
    ) -> Result<Option<PeerId>, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::UnregisterBySession {
                session,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Sorted snapshot of all registered peer identities.
    ///
    /// Returns an empty vector if communication with the actor fails.
    /// Diagnostics only; never used for routing decisions.
    pub async fn list_peers(&self) -> Vec<PeerId> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::ListPeers { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Check if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
