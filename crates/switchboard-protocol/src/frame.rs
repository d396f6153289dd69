//! Frame envelopes for client/relay communication.
//!
//! Frames are newline-delimited JSON. Client frames carry the protocol
//! version; relay frames are version-free (the attach response already
//! pinned compatibility for the connection).

use crate::channel::Channel;
use crate::signal::{SignalDraft, SignalKind, SignalingMessage};
use crate::version::PROTOCOL_VERSION;
use serde::{Deserialize, Serialize};
use switchboard_core::{PeerId, SessionKey};

/// Commands a client can send to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Handshake. Must be the first frame on a connection.
    Attach,

    /// A signaling event. `endpoint` names the signal kind the client
    /// invoked; the draft never carries an authoritative type of its own.
    Signal {
        endpoint: SignalKind,
        message: SignalDraft,
    },

    /// Subscribe this connection to a delivery channel.
    Subscribe { channel: Channel },

    /// Drop a subscription.
    Unsubscribe { channel: Channel },

    /// Request a snapshot of currently registered peer identities.
    ListPeers,

    /// Ping to check connection.
    Ping { seq: u64 },

    /// Client disconnecting gracefully.
    Detach,
}

/// Frames sent from client to relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    /// Protocol version.
    pub v: u16,

    /// Command payload.
    #[serde(flatten)]
    pub command: ClientCommand,
}

impl ClientFrame {
    /// Creates a frame with the current protocol version.
    pub fn new(command: ClientCommand) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            command,
        }
    }

    /// Creates an attach handshake frame.
    pub fn attach() -> Self {
        Self::new(ClientCommand::Attach)
    }

    /// Creates a signal frame.
    pub fn signal(endpoint: SignalKind, message: SignalDraft) -> Self {
        Self::new(ClientCommand::Signal { endpoint, message })
    }

    /// Creates a subscribe frame.
    pub fn subscribe(channel: Channel) -> Self {
        Self::new(ClientCommand::Subscribe { channel })
    }

    /// Creates an unsubscribe frame.
    pub fn unsubscribe(channel: Channel) -> Self {
        Self::new(ClientCommand::Unsubscribe { channel })
    }

    /// Creates a list-peers request.
    pub fn list_peers() -> Self {
        Self::new(ClientCommand::ListPeers)
    }

    /// Creates a ping frame.
    pub fn ping(seq: u64) -> Self {
        Self::new(ClientCommand::Ping { seq })
    }

    /// Creates a detach frame.
    pub fn detach() -> Self {
        Self::new(ClientCommand::Detach)
    }
}

/// Frames sent from relay to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayFrame {
    /// Attach accepted; the relay minted a session handle.
    Attached { v: u16, session: SessionKey },

    /// Attach rejected (version mismatch, protocol violation).
    Rejected { v: u16, reason: String },

    /// A message delivered on a channel this connection subscribes to.
    Delivery {
        channel: Channel,
        message: SignalingMessage,
    },

    /// Snapshot of currently registered peer identities.
    PeerList { peers: Vec<PeerId> },

    /// Pong response to ping.
    Pong { seq: u64 },

    /// Error response; the connection stays open.
    Error { message: String },
}

impl RelayFrame {
    /// Creates an attached response.
    pub fn attached(session: SessionKey) -> Self {
        Self::Attached {
            v: PROTOCOL_VERSION,
            session,
        }
    }

    /// Creates a rejected response.
    pub fn rejected(reason: &str) -> Self {
        Self::Rejected {
            v: PROTOCOL_VERSION,
            reason: reason.to_string(),
        }
    }

    /// Creates a delivery frame.
    pub fn delivery(channel: Channel, message: SignalingMessage) -> Self {
        Self::Delivery { channel, message }
    }

    /// Creates a peer list response.
    pub fn peer_list(peers: Vec<PeerId>) -> Self {
        Self::PeerList { peers }
    }

    /// Creates a pong response.
    pub fn pong(seq: u64) -> Self {
        Self::Pong { seq }
    }

    /// Creates an error response.
    pub fn error(message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }
}
