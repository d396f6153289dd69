//! Transport connect/disconnect handling.
//!
//! The lifecycle handler bridges transport events into registry and
//! presence state. It holds no per-session state of its own: everything
//! it needs to clean up after a vanished connection lives in the
//! registry's session index, so a disconnect for a session it never saw
//! connect is simply a no-op.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Registry failures during cleanup are logged, never propagated

use tracing::{debug, info, warn};

use switchboard_core::SessionKey;

use crate::registry::RegistryHandle;
use crate::router::SignalingRouter;

/// Handler for transport session connect/disconnect events.
///
/// Cheap to clone; the server gives every connection task one.
#[derive(Clone)]
pub struct LifecycleHandler {
    registry: RegistryHandle,
    router: SignalingRouter,
}

impl LifecycleHandler {
    pub fn new(registry: RegistryHandle, router: SignalingRouter) -> Self {
        Self { registry, router }
    }

    /// Records a new transport session. Log-only: registration happens
    /// when the peer announces PEER_ONLINE, not at connect time.
    pub fn on_connect(&self, session: &SessionKey) {
        info!(session = %session, "Session connected");
    }

    /// Cleans up after a vanished transport session.
    ///
    /// Resolves the session to a peer identity through the registry. A
    /// session that never announced presence, or whose identity has
    /// already re-registered from a newer session, resolves to nothing
    /// and nothing is evicted or announced. Idempotent: a second call
    /// for the same session is a debug-logged no-op.
    pub async fn on_disconnect(&self, session: &SessionKey) {
        let freed = match self.registry.unregister_by_session(session.clone()).await {
            Ok(freed) => freed,
            Err(e) => {
                warn!(session = %session, error = %e, "Registry unavailable for disconnect cleanup");
                return;
            }
        };

        match freed {
            Some(peer) => {
                info!(session = %session, peer = %peer, "Session disconnected, peer went offline");
                self.router.announce_offline(peer).await;
            }
            None => {
                debug!(session = %session, "Session disconnected, no registration to clean up");
            }
        }
    }
}
