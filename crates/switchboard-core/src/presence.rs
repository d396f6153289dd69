//! Session handles and presence entries.

use crate::PeerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token identifying one live transport connection.
///
/// Minted by the transport layer at connect time and invalidated at
/// disconnect. One physical connection, one key; a reconnecting client
/// gets a fresh key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Creates a new SessionKey from a string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The live binding of a peer identity to a transport session.
///
/// Owned exclusively by the peer registry. At most one entry exists per
/// peer identity and per session key at any instant; a later registration
/// for the same identity replaces the earlier entry.
#[derive(Debug, Clone)]
pub struct PresenceEntry {
    /// The registered peer identity.
    pub peer: PeerId,

    /// The transport session this identity is currently bound to.
    pub session: SessionKey,

    /// When this binding was created.
    pub registered_at: DateTime<Utc>,
}

impl PresenceEntry {
    /// Creates a presence entry stamped with the current time.
    pub fn new(peer: PeerId, session: SessionKey) -> Self {
        Self {
            peer,
            session,
            registered_at: Utc::now(),
        }
    }
}
