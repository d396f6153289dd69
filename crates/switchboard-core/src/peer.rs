//! Peer identity value object.

use crate::error::IdentityError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix carried by peer identities minted by the account frontend.
pub const PEER_ID_PREFIX: &str = "peer-";

/// Logical participant identity for the duration of one presence session.
///
/// Wraps an opaque string of the shape `peer-<userId>-<suffix>`, where
/// `<userId>` is the numeric identity from the account system and
/// `<suffix>` disambiguates repeated logins. The relay treats the token
/// as opaque except for [`PeerId::account_id`], which extracts the
/// leading numeric segment to report presence to the account system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Creates a new PeerId from a string.
    ///
    /// Note: This does not validate the shape. The account frontend mints
    /// peer identities, so we trust its format and fail softly later if
    /// the numeric segment turns out to be unparseable.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extracts the numeric account identity from the leading segment.
    ///
    /// `peer-42-a1b2` yields `42`. The `peer-` prefix is optional: a bare
    /// `42-a1b2` also parses, matching the lenient behavior clients rely on.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::MalformedPeerId`] when no parseable numeric
    /// segment leads the identity. Callers on the relay hot path log and
    /// swallow this; it never fails message routing.
    pub fn account_id(&self) -> Result<u64, IdentityError> {
        let stripped = self.0.strip_prefix(PEER_ID_PREFIX).unwrap_or(&self.0);
        let segment = stripped.split('-').next().unwrap_or(stripped);
        segment
            .parse::<u64>()
            .map_err(|_| IdentityError::MalformedPeerId(self.0.clone()))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_from_standard_shape() {
        let peer = PeerId::new("peer-7-abc");
        assert_eq!(peer.account_id().unwrap(), 7);
    }

    #[test]
    fn test_account_id_multi_digit() {
        let peer = PeerId::new("peer-31337-x9y8z7");
        assert_eq!(peer.account_id().unwrap(), 31337);
    }

    #[test]
    fn test_account_id_without_prefix() {
        let peer = PeerId::new("12-suffix");
        assert_eq!(peer.account_id().unwrap(), 12);
    }

    #[test]
    fn test_account_id_malformed() {
        let peer = PeerId::new("peer-notanumber-abc");
        assert!(matches!(
            peer.account_id(),
            Err(IdentityError::MalformedPeerId(_))
        ));
    }

    #[test]
    fn test_account_id_empty() {
        let peer = PeerId::new("");
        assert!(peer.account_id().is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let peer = PeerId::new("peer-7-abc");
        let json = serde_json::to_string(&peer).unwrap();
        assert_eq!(json, "\"peer-7-abc\"");
        let back: PeerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, peer);
    }

    #[test]
    fn test_display() {
        let peer = PeerId::new("peer-9-xyz");
        assert_eq!(peer.to_string(), "peer-9-xyz");
    }
}
