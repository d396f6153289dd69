//! Switchboard Core - Shared domain types for the signaling relay
//!
//! This crate provides the domain types shared between the relay daemon
//! (switchboardd) and the diagnostics client (switchboard).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()` outside of tests.

pub mod error;
pub mod group;
pub mod peer;
pub mod presence;
pub mod status;

// Re-exports for convenience
pub use error::IdentityError;
pub use group::GroupId;
pub use peer::PeerId;
pub use presence::{PresenceEntry, SessionKey};
pub use status::AccountStatus;
