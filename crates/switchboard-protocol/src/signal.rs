//! Signaling message types and the per-kind routing table.

use serde::{Deserialize, Serialize};
use std::fmt;
use switchboard_core::PeerId;

/// The closed set of signaling message types.
///
/// The serialized tokens are the wire contract with deployed clients.
/// Adding a variant requires a routing rule in [`SignalKind::routing`];
/// the exhaustive match there keeps the table and the set in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    #[serde(rename = "OFFER")]
    Offer,
    #[serde(rename = "ANSWER")]
    Answer,
    #[serde(rename = "ICE_CANDIDATE")]
    IceCandidate,
    #[serde(rename = "CALL_REQUEST")]
    CallRequest,
    #[serde(rename = "CALL_ACCEPT")]
    CallAccept,
    #[serde(rename = "CALL_REJECT")]
    CallReject,
    #[serde(rename = "TYPING")]
    Typing,
    #[serde(rename = "PEER_ONLINE")]
    PeerOnline,
    #[serde(rename = "PEER_OFFLINE")]
    PeerOffline,
    #[serde(rename = "GROUP_MEMBER_JOINED")]
    GroupMemberJoined,
    #[serde(rename = "GROUP_MEMBER_LEFT")]
    GroupMemberLeft,
}

impl SignalKind {
    /// Returns the delivery rule for this message kind.
    ///
    /// Note the deliberate asymmetry inherited from deployed behavior:
    /// OFFER/ANSWER/ICE_CANDIDATE/CALL_REQUEST are gated on a registry
    /// lookup, while CALL_ACCEPT, CALL_REJECT, and TYPING are delivered
    /// unconditionally.
    pub fn routing(&self) -> Routing {
        match self {
            Self::Offer | Self::Answer | Self::IceCandidate | Self::CallRequest => {
                Routing::PersonalChecked
            }
            Self::CallAccept => Routing::Personal,
            Self::CallReject | Self::Typing => Routing::Inbox,
            Self::PeerOnline => Routing::PresenceOnline,
            Self::PeerOffline => Routing::PresenceOffline,
            Self::GroupMemberJoined | Self::GroupMemberLeft => Routing::GroupFanout,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Offer => "OFFER",
            Self::Answer => "ANSWER",
            Self::IceCandidate => "ICE_CANDIDATE",
            Self::CallRequest => "CALL_REQUEST",
            Self::CallAccept => "CALL_ACCEPT",
            Self::CallReject => "CALL_REJECT",
            Self::Typing => "TYPING",
            Self::PeerOnline => "PEER_ONLINE",
            Self::PeerOffline => "PEER_OFFLINE",
            Self::GroupMemberJoined => "GROUP_MEMBER_JOINED",
            Self::GroupMemberLeft => "GROUP_MEMBER_LEFT",
        };
        write!(f, "{token}")
    }
}

/// Error for an unrecognized signal-kind token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown signal kind: {0}")]
pub struct SignalKindParseError(pub String);

impl std::str::FromStr for SignalKind {
    type Err = SignalKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OFFER" => Ok(Self::Offer),
            "ANSWER" => Ok(Self::Answer),
            "ICE_CANDIDATE" => Ok(Self::IceCandidate),
            "CALL_REQUEST" => Ok(Self::CallRequest),
            "CALL_ACCEPT" => Ok(Self::CallAccept),
            "CALL_REJECT" => Ok(Self::CallReject),
            "TYPING" => Ok(Self::Typing),
            "PEER_ONLINE" => Ok(Self::PeerOnline),
            "PEER_OFFLINE" => Ok(Self::PeerOffline),
            "GROUP_MEMBER_JOINED" => Ok(Self::GroupMemberJoined),
            "GROUP_MEMBER_LEFT" => Ok(Self::GroupMemberLeft),
            other => Err(SignalKindParseError(other.to_string())),
        }
    }
}

/// Per-kind delivery rule.
///
/// The router matches exhaustively on this; each variant is one arm of
/// the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Personal channel of `to`, gated on a registry lookup.
    /// Unresolved target: warn and drop.
    PersonalChecked,

    /// Personal channel of `to`, no registry check.
    Personal,

    /// Direct inbox channel of `to`, no registry check.
    Inbox,

    /// Register `from` on the origin session, then broadcast on the
    /// all-peers channel.
    PresenceOnline,

    /// Unregister `from`, then broadcast on the all-peers channel.
    PresenceOffline,

    /// Resolve the group's current member set and deliver a copy
    /// re-targeted to each member's personal channel.
    GroupFanout,
}

/// Outbound signaling message, stamped by the relay.
///
/// `kind` and `timestamp` are always set by the router at dispatch,
/// never taken from client input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingMessage {
    #[serde(rename = "type")]
    pub kind: SignalKind,

    pub from: PeerId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<PeerId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// Relay-assigned dispatch time, milliseconds since epoch.
    pub timestamp: i64,
}

impl SignalingMessage {
    /// Builds a presence notification carrying only kind, sender, and time.
    pub fn notification(kind: SignalKind, from: PeerId, timestamp: i64) -> Self {
        Self {
            kind,
            from,
            to: None,
            payload: None,
            timestamp,
        }
    }
}

/// Inbound, untrusted signaling draft.
///
/// Deliberately has no `type` or `timestamp` field: any such JSON keys a
/// client supplies are dropped during deserialization, so classification
/// and clocking stay with the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalDraft {
    pub from: PeerId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<PeerId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl SignalDraft {
    /// Creates a draft addressed to one peer.
    pub fn to_peer(from: PeerId, to: PeerId, payload: Option<serde_json::Value>) -> Self {
        Self {
            from,
            to: Some(to),
            payload,
        }
    }

    /// Creates an unaddressed draft (presence announcements).
    pub fn announce(from: PeerId) -> Self {
        Self {
            from,
            to: None,
            payload: None,
        }
    }

    /// Promotes the draft into an outbound message with relay-authoritative
    /// kind and timestamp.
    pub fn stamp(self, kind: SignalKind, timestamp: i64) -> SignalingMessage {
        SignalingMessage {
            kind,
            from: self.from,
            to: self.to,
            payload: self.payload,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_tokens() {
        let cases = [
            (SignalKind::Offer, "OFFER"),
            (SignalKind::Answer, "ANSWER"),
            (SignalKind::IceCandidate, "ICE_CANDIDATE"),
            (SignalKind::CallRequest, "CALL_REQUEST"),
            (SignalKind::CallAccept, "CALL_ACCEPT"),
            (SignalKind::CallReject, "CALL_REJECT"),
            (SignalKind::Typing, "TYPING"),
            (SignalKind::PeerOnline, "PEER_ONLINE"),
            (SignalKind::PeerOffline, "PEER_OFFLINE"),
            (SignalKind::GroupMemberJoined, "GROUP_MEMBER_JOINED"),
            (SignalKind::GroupMemberLeft, "GROUP_MEMBER_LEFT"),
        ];
        for (kind, token) in cases {
            assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{token}\""));
            assert_eq!(kind.to_string(), token);
            assert_eq!(token.parse::<SignalKind>().unwrap(), kind);
        }
        assert!("OFFERS".parse::<SignalKind>().is_err());
    }

    #[test]
    fn test_routing_table_asymmetry() {
        // Call-control asymmetry is observed behavior, kept on purpose.
        assert_eq!(SignalKind::CallRequest.routing(), Routing::PersonalChecked);
        assert_eq!(SignalKind::CallAccept.routing(), Routing::Personal);
        assert_eq!(SignalKind::CallReject.routing(), Routing::Inbox);
        assert_eq!(SignalKind::Typing.routing(), Routing::Inbox);
    }

    #[test]
    fn test_draft_ignores_client_type_and_timestamp() {
        let json = r#"{"from":"peer-9-xyz","to":"peer-7-abc","type":"ANSWER","timestamp":1}"#;
        let draft: SignalDraft = serde_json::from_str(json).unwrap();
        let msg = draft.stamp(SignalKind::Offer, 1_700_000_000_000);
        assert_eq!(msg.kind, SignalKind::Offer);
        assert_eq!(msg.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_message_serialization_shape() {
        let msg = SignalingMessage::notification(
            SignalKind::PeerOffline,
            PeerId::new("peer-7-abc"),
            42,
        );
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"PEER_OFFLINE\""));
        assert!(json.contains("\"from\":\"peer-7-abc\""));
        assert!(json.contains("\"timestamp\":42"));
        assert!(!json.contains("\"to\""));
        assert!(!json.contains("\"payload\""));
    }

    #[test]
    fn test_payload_passthrough() {
        let payload = serde_json::json!({"sdp": "v=0...", "nested": {"k": 1}});
        let draft = SignalDraft::to_peer(
            PeerId::new("peer-9-xyz"),
            PeerId::new("peer-7-abc"),
            Some(payload.clone()),
        );
        let msg = draft.stamp(SignalKind::Offer, 1);
        assert_eq!(msg.payload, Some(payload));
    }
}
