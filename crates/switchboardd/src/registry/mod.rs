//! Peer registry using the actor pattern.
//!
//! The registry is the only shared mutable state in the relay core: the
//! bidirectional binding between peer identities and live transport
//! sessions. A single actor task owns both directions of the map and
//! processes commands sequentially over an mpsc channel, so every public
//! operation is atomic with respect to every other and the maps can
//! never disagree, no matter how routing and lifecycle tasks interleave.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{RegistryCommand, RegistryError};
pub use handle::RegistryHandle;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 100;

/// Spawn the registry actor and return a handle for interaction.
///
/// The actor runs until every handle clone is dropped.
///
/// # Example
///
/// ```no_run
/// use switchboardd::registry::spawn_registry;
/// use switchboard_core::{PeerId, SessionKey};
///
/// #[tokio::main]
/// async fn main() {
///     let registry = spawn_registry();
///     let _ = registry
///         .register(PeerId::new("peer-7-abc"), SessionKey::new("sess-1"))
///         .await;
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
