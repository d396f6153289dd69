//! Switchboard Daemon - peer registry and signaling relay
//!
//! This crate provides the core infrastructure for the relay daemon:
//! - `registry` - Peer registry actor binding peer identities to sessions
//! - `router` - Per-type dispatcher for signaling messages
//! - `lifecycle` - Transport connect/disconnect handling
//! - `broker` - Topic/subscription delivery mechanism
//! - `directory` - Seams for the account-status and group collaborators
//! - `server` - TCP server speaking newline-delimited JSON frames
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  Signal frames   ┌─────────────────┐
//! │   RelayServer   │─────────────────▶│ SignalingRouter │
//! │ (TCP listener)  │                  │  (per-type rule)│
//! └───────┬─────────┘                  └────────┬────────┘
//!         │ connect/disconnect                  │ lookup        publish
//!         ▼                                     ▼                  │
//! ┌─────────────────┐   unregister    ┌─────────────────┐          ▼
//! │LifecycleHandler │────────────────▶│  RegistryActor  │  ┌───────────────┐
//! │ (per session)   │                 │ (presence owner)│  │ ChannelBroker │
//! └─────────────────┘                 └─────────────────┘  │ (subscribers) │
//!                                                          └───────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod broker;
pub mod directory;
pub mod lifecycle;
pub mod registry;
pub mod router;
pub mod server;
