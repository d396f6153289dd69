//! Diagnostics client library for the switchboard relay.
//!
//! Provides [`client::RelayClient`], a small line-JSON client used by
//! the `switchboard` binary to attach to a running relay, inspect the
//! peer roster, watch delivery channels, and inject signals.
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result`

pub mod client;
pub mod error;

pub use client::RelayClient;
pub use error::ClientError;
