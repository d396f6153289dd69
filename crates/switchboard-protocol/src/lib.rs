//! Switchboard Protocol - Wire protocol for the signaling relay
//!
//! This crate provides the signaling message types, delivery-channel
//! addressing, and client/relay frame envelopes exchanged between
//! browser peers and the relay daemon.
//!
//! Message `type` tokens and channel names are a compatibility contract
//! with deployed clients and must not change shape.

pub mod channel;
pub mod frame;
pub mod signal;
pub mod version;

pub use channel::{Channel, ChannelParseError};
pub use frame::{ClientCommand, ClientFrame, RelayFrame};
pub use signal::{Routing, SignalDraft, SignalKind, SignalKindParseError, SignalingMessage};
pub use version::{is_supported, PROTOCOL_VERSION};
