//! Registry actor - owns all presence state and processes commands.
//!
//! The `RegistryActor` is the single owner of the peer-identity to
//! session binding. It receives commands via an mpsc channel and
//! processes them sequentially, which is the concurrency discipline
//! that keeps the two directional maps mutually consistent: no state
//! where identity→session points at a session whose reverse entry
//! points elsewhere.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel send failures are logged but don't panic

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info};

use switchboard_core::{PeerId, PresenceEntry, SessionKey};

use super::commands::RegistryCommand;

/// The registry actor - owns all presence state.
///
/// # Ownership
///
/// The actor owns:
/// - `entries`: peer identity → presence entry (primary direction)
/// - `session_index`: session key → peer identity (reverse direction)
///
/// Both maps are only ever touched inside the actor's task, so every
/// public operation is atomic with respect to every other. In
/// particular, when `register(P, S2)` lands before a delayed
/// `unregister_by_session(S1)` for P's previous session, S1's reverse
/// entry is already gone and the stale cleanup is a no-op: P stays
/// registered on S2 regardless of interleaving.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Primary presence storage: peer identity → entry
    entries: HashMap<PeerId, PresenceEntry>,

    /// Reverse index for session → identity lookups
    session_index: HashMap<SessionKey, PeerId>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            receiver,
            entries: HashMap::new(),
            session_index: HashMap::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    /// This is the main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!("Peer registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(peers = self.entries.len(), "Peer registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                peer,
                session,
                respond_to,
            } => {
                let displaced = self.handle_register(peer, session);
                // Ignore send error - caller may have dropped the receiver
                let _ = respond_to.send(displaced);
            }
            RegistryCommand::LookupSession { peer, respond_to } => {
                let result = self.entries.get(&peer).map(|e| e.session.clone());
                let _ = respond_to.send(result);
            }
            RegistryCommand::Unregister { peer, respond_to } => {
                let removed = self.handle_unregister(&peer);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::UnregisterBySession {
                session,
                respond_to,
            } => {
                let freed = self.handle_unregister_by_session(&session);
                let _ = respond_to.send(freed);
            }
            RegistryCommand::ListPeers { respond_to } => {
                let mut peers: Vec<PeerId> = self.entries.keys().cloned().collect();
                peers.sort_by(|a, b| a.as_str().cmp(b.as_str()));
                let _ = respond_to.send(peers);
            }
        }
    }

    /// Binds `peer` to `session`, replacing any prior binding.
    ///
    /// The displaced session's reverse mapping is removed in the same
    /// turn, so a stale session can never resolve to a retired identity.
    /// Returns the displaced session, if any.
    fn handle_register(&mut self, peer: PeerId, session: SessionKey) -> Option<SessionKey> {
        // A session rebinding to a different identity releases the old
        // one in the same turn; otherwise the old identity would keep
        // resolving to this session.
        if let Some(prior) = self.session_index.get(&session) {
            if *prior != peer {
                let prior = prior.clone();
                self.entries.remove(&prior);
                debug!(
                    session = %session,
                    prior_peer = %prior,
                    new_peer = %peer,
                    "Session rebound to new identity, releasing prior one"
                );
            }
        }

        let entry = PresenceEntry::new(peer.clone(), session.clone());
        let displaced = self.entries.insert(peer.clone(), entry).map(|old| old.session);

        if let Some(ref stale) = displaced {
            self.session_index.remove(stale);
            debug!(
                peer = %peer,
                stale_session = %stale,
                "Replaced prior session for reconnecting peer"
            );
        }

        self.session_index.insert(session.clone(), peer.clone());

        info!(
            peer = %peer,
            session = %session,
            total_peers = self.entries.len(),
            "Peer registered"
        );

        displaced
    }

    /// Removes the binding for `peer`. Idempotent.
    fn handle_unregister(&mut self, peer: &PeerId) -> bool {
        match self.entries.remove(peer) {
            Some(entry) => {
                self.session_index.remove(&entry.session);
                info!(
                    peer = %peer,
                    session = %entry.session,
                    remaining_peers = self.entries.len(),
                    "Peer unregistered"
                );
                true
            }
            None => {
                debug!(peer = %peer, "Unregister for unknown peer, no-op");
                false
            }
        }
    }

    /// Removes the binding held by `session`, returning the freed identity.
    ///
    /// A session whose reverse entry is gone (replaced by a newer
    /// registration) resolves to `None` without touching the newer entry.
    fn handle_unregister_by_session(&mut self, session: &SessionKey) -> Option<PeerId> {
        let peer = self.session_index.remove(session)?;
        self.entries.remove(&peer);

        info!(
            peer = %peer,
            session = %session,
            remaining_peers = self.entries.len(),
            "Peer unregistered by session"
        );

        Some(peer)
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    /// Returns the number of registered peers.
    #[cfg(test)]
    fn peer_count(&self) -> usize {
        self.entries.len()
    }

    /// Checks both maps agree with each other.
    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        self.entries.len() == self.session_index.len()
            && self.entries.iter().all(|(peer, entry)| {
                self.session_index.get(&entry.session) == Some(peer)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    fn peer(id: &str) -> PeerId {
        PeerId::new(id)
    }

    fn sess(key: &str) -> SessionKey {
        SessionKey::new(key)
    }

    fn actor() -> RegistryActor {
        let (_tx, rx) = mpsc::channel(16);
        RegistryActor::new(rx)
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let mut actor = actor();

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Register {
            peer: peer("peer-7-abc"),
            session: sess("S1"),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap(), None);

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::LookupSession {
            peer: peer("peer-7-abc"),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap(), Some(sess("S1")));
        assert!(actor.is_consistent());
    }

    #[tokio::test]
    async fn test_lookup_unknown_is_none() {
        let mut actor = actor();

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::LookupSession {
            peer: peer("peer-404-x"),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reregistration_replaces_and_reports_displaced() {
        let mut actor = actor();

        let (tx, _rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Register {
            peer: peer("peer-7-abc"),
            session: sess("S1"),
            respond_to: tx,
        });

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Register {
            peer: peer("peer-7-abc"),
            session: sess("S2"),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap(), Some(sess("S1")));

        assert_eq!(actor.peer_count(), 1);
        assert!(actor.is_consistent());

        // The identity resolves to the new session.
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::LookupSession {
            peer: peer("peer-7-abc"),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap(), Some(sess("S2")));
    }

    #[tokio::test]
    async fn test_stale_session_cleanup_does_not_evict_newer_entry() {
        // Out-of-order delivery: peer reconnects on S2 before S1's
        // disconnect cleanup is processed.
        let mut actor = actor();

        let (tx, _rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Register {
            peer: peer("peer-7-abc"),
            session: sess("S1"),
            respond_to: tx,
        });
        let (tx, _rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Register {
            peer: peer("peer-7-abc"),
            session: sess("S2"),
            respond_to: tx,
        });

        // Delayed cleanup of the stale session is a no-op.
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::UnregisterBySession {
            session: sess("S1"),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap(), None);

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::LookupSession {
            peer: peer("peer-7-abc"),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap(), Some(sess("S2")));
        assert!(actor.is_consistent());
    }

    #[tokio::test]
    async fn test_session_rebinding_to_new_identity_releases_prior_one() {
        // One connection announcing as a second identity: the first
        // identity must not linger bound to the shared session.
        let mut actor = actor();

        let (tx, _rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Register {
            peer: peer("peer-1-a"),
            session: sess("S1"),
            respond_to: tx,
        });
        let (tx, _rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Register {
            peer: peer("peer-2-b"),
            session: sess("S1"),
            respond_to: tx,
        });
        assert_eq!(actor.peer_count(), 1);
        assert!(actor.is_consistent());

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::LookupSession {
            peer: peer("peer-1-a"),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap(), None);

        // Session cleanup frees only the current identity and leaves
        // nothing behind.
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::UnregisterBySession {
            session: sess("S1"),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap(), Some(peer("peer-2-b")));
        assert_eq!(actor.peer_count(), 0);
        assert!(actor.is_consistent());
    }

    #[tokio::test]
    async fn test_unregister_by_session_returns_freed_identity() {
        let mut actor = actor();

        let (tx, _rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Register {
            peer: peer("peer-7-abc"),
            session: sess("S1"),
            respond_to: tx,
        });

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::UnregisterBySession {
            session: sess("S1"),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap(), Some(peer("peer-7-abc")));
        assert_eq!(actor.peer_count(), 0);
        assert!(actor.is_consistent());
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let mut actor = actor();

        let (tx, _rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Register {
            peer: peer("peer-7-abc"),
            session: sess("S1"),
            respond_to: tx,
        });

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Unregister {
            peer: peer("peer-7-abc"),
            respond_to: tx,
        });
        assert!(rx.await.unwrap());

        // Second removal is a no-op success, not an error.
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Unregister {
            peer: peer("peer-7-abc"),
            respond_to: tx,
        });
        assert!(!rx.await.unwrap());
        assert!(actor.is_consistent());
    }

    #[tokio::test]
    async fn test_list_peers_is_sorted() {
        let mut actor = actor();

        for (p, s) in [("peer-9-c", "S3"), ("peer-1-a", "S1"), ("peer-5-b", "S2")] {
            let (tx, _rx) = oneshot::channel();
            actor.handle_command(RegistryCommand::Register {
                peer: peer(p),
                session: sess(s),
                respond_to: tx,
            });
        }

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::ListPeers { respond_to: tx });
        let peers = rx.await.unwrap();
        assert_eq!(
            peers,
            vec![peer("peer-1-a"), peer("peer-5-b"), peer("peer-9-c")]
        );
    }

    #[tokio::test]
    async fn test_bijection_over_mixed_sequence() {
        let mut actor = actor();

        // register A/S1, B/S2, re-register A/S3, drop B by session,
        // drop A's stale S1.
        let script = [
            ("reg", "peer-1-a", "S1"),
            ("reg", "peer-2-b", "S2"),
            ("reg", "peer-1-a", "S3"),
        ];
        for (_, p, s) in script {
            let (tx, _rx) = oneshot::channel();
            actor.handle_command(RegistryCommand::Register {
                peer: peer(p),
                session: sess(s),
                respond_to: tx,
            });
            assert!(actor.is_consistent());
        }

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::UnregisterBySession {
            session: sess("S2"),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap(), Some(peer("peer-2-b")));

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::UnregisterBySession {
            session: sess("S1"),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap(), None);

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::LookupSession {
            peer: peer("peer-1-a"),
            respond_to: tx,
        });
        assert_eq!(rx.await.unwrap(), Some(sess("S3")));
        assert!(actor.is_consistent());
    }
}
