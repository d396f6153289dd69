//! Delivery-channel addressing.
//!
//! Channel names are the wire contract inherited from the original
//! topic/subscription broker: a per-identity personal topic, a distinct
//! per-identity direct inbox, and one shared all-peers topic.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use switchboard_core::PeerId;
use thiserror::Error;

const PERSONAL_PREFIX: &str = "/topic/peer/";
const INBOX_PREFIX: &str = "/user/";
const INBOX_SUFFIX: &str = "/queue/signal";
const ALL_PEERS: &str = "/topic/peers";

/// A delivery destination on the relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Personal broadcast topic of one peer identity: `/topic/peer/{id}`.
    Personal(PeerId),

    /// Direct per-identity inbox, distinct from the personal topic:
    /// `/user/{id}/queue/signal`.
    Inbox(PeerId),

    /// Shared broadcast topic reaching every subscriber: `/topic/peers`.
    AllPeers,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Personal(peer) => write!(f, "{PERSONAL_PREFIX}{peer}"),
            Self::Inbox(peer) => write!(f, "{INBOX_PREFIX}{peer}{INBOX_SUFFIX}"),
            Self::AllPeers => write!(f, "{ALL_PEERS}"),
        }
    }
}

impl FromStr for Channel {
    type Err = ChannelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ALL_PEERS {
            return Ok(Self::AllPeers);
        }
        if let Some(id) = s.strip_prefix(PERSONAL_PREFIX) {
            if !id.is_empty() {
                return Ok(Self::Personal(PeerId::new(id)));
            }
        }
        if let Some(rest) = s.strip_prefix(INBOX_PREFIX) {
            if let Some(id) = rest.strip_suffix(INBOX_SUFFIX) {
                if !id.is_empty() {
                    return Ok(Self::Inbox(PeerId::new(id)));
                }
            }
        }
        Err(ChannelParseError::UnknownChannel(s.to_string()))
    }
}

// Channels travel as their string form inside frames.
impl Serialize for Channel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Errors that can occur when parsing a channel name.
#[derive(Error, Debug, Clone)]
pub enum ChannelParseError {
    #[error("unknown channel name: {0}")]
    UnknownChannel(String),
}
