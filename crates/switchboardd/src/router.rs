//! Signaling router - per-type dispatch of inbound signaling events.
//!
//! Stateless per message: for each inbound draft the router stamps the
//! authoritative `type` and `timestamp`, applies the kind's routing rule
//! from [`SignalKind::routing`], consults the peer registry where the
//! rule asks for it, and hands the result to the channel broker.
//! Delivery is fire-and-forget; an unresolved target is a warning and a
//! drop, never an error returned to the sender.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Collaborator failures are caught and logged, never propagated

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use switchboard_core::{AccountStatus, GroupId, PeerId, SessionKey};
use switchboard_protocol::{Channel, Routing, SignalDraft, SignalKind, SignalingMessage};

use crate::broker::ChannelBroker;
use crate::directory::{AccountStatusSink, GroupDirectory};
use crate::registry::RegistryHandle;

/// Payload key the group fan-out path resolves membership from.
const GROUP_ID_KEY: &str = "groupId";

/// Per-message dispatcher for signaling events.
///
/// Cheap to clone; every connection task holds one.
#[derive(Clone)]
pub struct SignalingRouter {
    registry: RegistryHandle,
    broker: ChannelBroker,
    accounts: Arc<dyn AccountStatusSink>,
    groups: Arc<dyn GroupDirectory>,
}

impl SignalingRouter {
    /// Creates a router over the given registry, broker, and collaborators.
    pub fn new(
        registry: RegistryHandle,
        broker: ChannelBroker,
        accounts: Arc<dyn AccountStatusSink>,
        groups: Arc<dyn GroupDirectory>,
    ) -> Self {
        Self {
            registry,
            broker,
            accounts,
            groups,
        }
    }

    /// Routes one inbound signaling event.
    ///
    /// `endpoint` is the signal kind the client invoked and `origin` the
    /// transport session it arrived on. The draft's missing `type` and
    /// `timestamp` are relay-assigned here; nothing a client supplies can
    /// reclassify or re-clock a message.
    pub async fn dispatch(&self, endpoint: SignalKind, draft: SignalDraft, origin: &SessionKey) {
        let timestamp = Utc::now().timestamp_millis();

        match endpoint.routing() {
            Routing::PersonalChecked => {
                let Some(to) = draft.to.clone() else {
                    warn!(kind = %endpoint, from = %draft.from, "Signal without target, dropping");
                    return;
                };

                // Reachability gate; the send itself re-targets by identity.
                if self.registry.lookup_session(to.clone()).await.is_none() {
                    warn!(
                        kind = %endpoint,
                        from = %draft.from,
                        to = %to,
                        "Target peer not registered, dropping"
                    );
                    return;
                }

                let message = draft.stamp(endpoint, timestamp);
                let delivered = self.broker.publish(Channel::Personal(to.clone()), message).await;
                debug!(kind = %endpoint, to = %to, delivered, "Forwarded signal");
            }

            Routing::Personal => {
                let Some(to) = draft.to.clone() else {
                    warn!(kind = %endpoint, from = %draft.from, "Signal without target, dropping");
                    return;
                };

                // Delivered without a registry check; kept as observed
                // behavior of the deployed protocol.
                let message = draft.stamp(endpoint, timestamp);
                let delivered = self.broker.publish(Channel::Personal(to.clone()), message).await;
                debug!(kind = %endpoint, to = %to, delivered, "Forwarded signal");
            }

            Routing::Inbox => {
                let Some(to) = draft.to.clone() else {
                    warn!(kind = %endpoint, from = %draft.from, "Signal without target, dropping");
                    return;
                };

                let message = draft.stamp(endpoint, timestamp);
                let delivered = self.broker.publish(Channel::Inbox(to.clone()), message).await;
                debug!(kind = %endpoint, to = %to, delivered, "Forwarded to inbox");
            }

            Routing::PresenceOnline => {
                let peer = draft.from.clone();
                info!(peer = %peer, session = %origin, "Peer announced online");

                match self.registry.register(peer.clone(), origin.clone()).await {
                    Ok(Some(stale)) => {
                        debug!(peer = %peer, stale_session = %stale, "Reconnect replaced prior session");
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "Registry unavailable for registration");
                        return;
                    }
                }

                self.report_account_status(&peer, AccountStatus::Online).await;
                self.broadcast_presence(SignalKind::PeerOnline, peer).await;
            }

            Routing::PresenceOffline => {
                let peer = draft.from.clone();
                info!(peer = %peer, "Peer announced offline");

                if let Err(e) = self.registry.unregister(peer.clone()).await {
                    warn!(peer = %peer, error = %e, "Registry unavailable for unregistration");
                }

                self.announce_offline(peer).await;
            }

            Routing::GroupFanout => {
                self.fan_out_to_group(endpoint, draft, timestamp).await;
            }
        }
    }

    /// Presence-offline side-effects shared with the lifecycle handler:
    /// best-effort account-status update plus a PEER_OFFLINE broadcast on
    /// the all-peers channel, timestamped at broadcast time.
    pub async fn announce_offline(&self, peer: PeerId) {
        self.report_account_status(&peer, AccountStatus::Offline).await;
        self.broadcast_presence(SignalKind::PeerOffline, peer).await;
    }

    /// Broadcasts a freshly built presence notification on the all-peers
    /// channel.
    async fn broadcast_presence(&self, kind: SignalKind, peer: PeerId) {
        let message =
            SignalingMessage::notification(kind, peer.clone(), Utc::now().timestamp_millis());
        let delivered = self.broker.publish(Channel::AllPeers, message).await;
        debug!(kind = %kind, peer = %peer, delivered, "Broadcast presence notification");
    }

    /// Best-effort account-status side-effect.
    ///
    /// Parses the numeric account identity from the peer token. Parse
    /// failures and sink failures are logged and swallowed; the message
    /// itself keeps routing.
    async fn report_account_status(&self, peer: &PeerId, status: AccountStatus) {
        let account_id = match peer.account_id() {
            Ok(id) => id,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Skipping account status update");
                return;
            }
        };

        if let Err(e) = self.accounts.set_status(account_id, status).await {
            warn!(
                account_id,
                status = %status,
                error = %e,
                "Account status sink failed"
            );
        }
    }

    /// Delivers a group membership notice to every current member's
    /// personal channel, each copy re-targeted to that member.
    async fn fan_out_to_group(&self, kind: SignalKind, draft: SignalDraft, timestamp: i64) {
        let Some(group) = draft
            .payload
            .as_ref()
            .and_then(|p| p.get(GROUP_ID_KEY))
            .and_then(serde_json::Value::as_u64)
            .map(GroupId::new)
        else {
            warn!(kind = %kind, from = %draft.from, "Group notice without groupId, dropping");
            return;
        };

        let members = match self.groups.members(group).await {
            Ok(members) => members,
            Err(e) => {
                warn!(kind = %kind, group = %group, error = %e, "Group membership lookup failed");
                return;
            }
        };

        let mut delivered = 0;
        for member in &members {
            let message = SignalingMessage {
                kind,
                from: draft.from.clone(),
                to: Some(member.clone()),
                payload: draft.payload.clone(),
                timestamp,
            };
            delivered += self
                .broker
                .publish(Channel::Personal(member.clone()), message)
                .await;
        }

        info!(
            kind = %kind,
            group = %group,
            members = members.len(),
            delivered,
            "Fanned out group notice"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::subscriber_writer;
    use crate::directory::{DirectoryError, EmptyGroupDirectory, StaticGroupDirectory};
    use crate::registry::spawn_registry;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream};
    use switchboard_protocol::RelayFrame;

    /// Account sink that records every call for assertions.
    #[derive(Default)]
    struct RecordingSink {
        calls: StdMutex<Vec<(u64, AccountStatus)>>,
    }

    impl RecordingSink {
        fn calls(&self) -> Vec<(u64, AccountStatus)> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl AccountStatusSink for RecordingSink {
        async fn set_status(
            &self,
            account_id: u64,
            status: AccountStatus,
        ) -> Result<(), DirectoryError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((account_id, status));
            }
            Ok(())
        }
    }

    /// Account sink that always fails, for degradation tests.
    struct FailingSink;

    #[async_trait]
    impl AccountStatusSink for FailingSink {
        async fn set_status(&self, _: u64, _: AccountStatus) -> Result<(), DirectoryError> {
            Err(DirectoryError::Unavailable("database down".to_string()))
        }
    }

    struct TestRig {
        router: SignalingRouter,
        registry: RegistryHandle,
        broker: ChannelBroker,
        sink: Arc<RecordingSink>,
    }

    fn rig_with_groups(groups: StaticGroupDirectory) -> TestRig {
        let registry = spawn_registry();
        let broker = ChannelBroker::new();
        let sink = Arc::new(RecordingSink::default());
        let router = SignalingRouter::new(
            registry.clone(),
            broker.clone(),
            Arc::clone(&sink) as Arc<dyn AccountStatusSink>,
            Arc::new(groups),
        );
        TestRig {
            router,
            registry,
            broker,
            sink,
        }
    }

    fn rig() -> TestRig {
        rig_with_groups(StaticGroupDirectory::new())
    }

    /// Subscribes a fresh in-memory reader to a channel and returns it.
    async fn subscribe(broker: &ChannelBroker, session: &str, channel: Channel) -> BufReader<DuplexStream> {
        let (rx, tx) = tokio::io::duplex(16 * 1024);
        broker
            .subscribe(SessionKey::new(session), channel, subscriber_writer(tx))
            .await
            .unwrap();
        BufReader::new(rx)
    }

    async fn read_delivery(reader: &mut BufReader<DuplexStream>) -> (Channel, SignalingMessage) {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        match serde_json::from_str::<RelayFrame>(&line).unwrap() {
            RelayFrame::Delivery { channel, message } => (channel, message),
            other => panic!("expected delivery frame, got {other:?}"),
        }
    }

    async fn assert_no_delivery(reader: &mut BufReader<DuplexStream>) {
        let mut line = String::new();
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            reader.read_line(&mut line),
        )
        .await;
        assert!(result.is_err(), "unexpected delivery: {line}");
    }

    #[tokio::test]
    async fn test_offer_routed_to_registered_target() {
        let rig = rig();
        let target = PeerId::new("peer-7-abc");
        rig.registry
            .register(target.clone(), SessionKey::new("S1"))
            .await
            .unwrap();

        let mut reader =
            subscribe(&rig.broker, "S1", Channel::Personal(target.clone())).await;

        let before = Utc::now().timestamp_millis();
        let draft = SignalDraft::to_peer(
            PeerId::new("peer-9-xyz"),
            target.clone(),
            Some(serde_json::json!({"sdp": "v=0"})),
        );
        rig.router
            .dispatch(SignalKind::Offer, draft, &SessionKey::new("S9"))
            .await;

        let (channel, message) = read_delivery(&mut reader).await;
        assert_eq!(channel, Channel::Personal(target));
        assert_eq!(message.kind, SignalKind::Offer);
        assert_eq!(message.from.as_str(), "peer-9-xyz");
        assert!(message.timestamp >= before);
        assert_eq!(message.payload, Some(serde_json::json!({"sdp": "v=0"})));
    }

    #[tokio::test]
    async fn test_offer_to_unregistered_target_is_dropped() {
        let rig = rig();
        let target = PeerId::new("peer-7-abc");

        // Subscribed but never registered: the reachability gate drops it.
        let mut reader =
            subscribe(&rig.broker, "S1", Channel::Personal(target.clone())).await;

        let draft = SignalDraft::to_peer(PeerId::new("peer-9-xyz"), target, None);
        rig.router
            .dispatch(SignalKind::Offer, draft, &SessionKey::new("S9"))
            .await;

        assert_no_delivery(&mut reader).await;
    }

    #[tokio::test]
    async fn test_call_accept_skips_registry_check() {
        let rig = rig();
        let initiator = PeerId::new("peer-7-abc");

        // Not registered, yet CALL_ACCEPT is still delivered.
        let mut reader =
            subscribe(&rig.broker, "S1", Channel::Personal(initiator.clone())).await;

        let draft = SignalDraft::to_peer(PeerId::new("peer-9-xyz"), initiator.clone(), None);
        rig.router
            .dispatch(SignalKind::CallAccept, draft, &SessionKey::new("S9"))
            .await;

        let (_, message) = read_delivery(&mut reader).await;
        assert_eq!(message.kind, SignalKind::CallAccept);
    }

    #[tokio::test]
    async fn test_call_reject_and_typing_use_inbox() {
        let rig = rig();
        let target = PeerId::new("peer-7-abc");
        let mut reader = subscribe(&rig.broker, "S1", Channel::Inbox(target.clone())).await;

        for kind in [SignalKind::CallReject, SignalKind::Typing] {
            let draft = SignalDraft::to_peer(PeerId::new("peer-9-xyz"), target.clone(), None);
            rig.router.dispatch(kind, draft, &SessionKey::new("S9")).await;

            let (channel, message) = read_delivery(&mut reader).await;
            assert_eq!(channel, Channel::Inbox(target.clone()));
            assert_eq!(message.kind, kind);
        }
    }

    #[tokio::test]
    async fn test_peer_online_registers_and_broadcasts() {
        let rig = rig();
        let mut reader = subscribe(&rig.broker, "S5", Channel::AllPeers).await;

        let peer = PeerId::new("peer-7-abc");
        rig.router
            .dispatch(
                SignalKind::PeerOnline,
                SignalDraft::announce(peer.clone()),
                &SessionKey::new("S1"),
            )
            .await;

        assert_eq!(
            rig.registry.lookup_session(peer.clone()).await,
            Some(SessionKey::new("S1"))
        );

        let (channel, message) = read_delivery(&mut reader).await;
        assert_eq!(channel, Channel::AllPeers);
        assert_eq!(message.kind, SignalKind::PeerOnline);
        assert_eq!(message.from, peer);
        assert!(message.to.is_none());

        assert_eq!(rig.sink.calls(), vec![(7, AccountStatus::Online)]);
    }

    #[tokio::test]
    async fn test_peer_offline_unregisters_and_broadcasts() {
        let rig = rig();
        let peer = PeerId::new("peer-7-abc");
        rig.registry
            .register(peer.clone(), SessionKey::new("S1"))
            .await
            .unwrap();

        let mut reader = subscribe(&rig.broker, "S5", Channel::AllPeers).await;

        rig.router
            .dispatch(
                SignalKind::PeerOffline,
                SignalDraft::announce(peer.clone()),
                &SessionKey::new("S1"),
            )
            .await;

        assert!(rig.registry.lookup_session(peer.clone()).await.is_none());

        let (_, message) = read_delivery(&mut reader).await;
        assert_eq!(message.kind, SignalKind::PeerOffline);
        assert_eq!(message.from, peer);
        assert_eq!(rig.sink.calls(), vec![(7, AccountStatus::Offline)]);
    }

    #[tokio::test]
    async fn test_malformed_peer_id_skips_sink_but_still_broadcasts() {
        let rig = rig();
        let mut reader = subscribe(&rig.broker, "S5", Channel::AllPeers).await;

        let peer = PeerId::new("peer-nonsense-abc");
        rig.router
            .dispatch(
                SignalKind::PeerOnline,
                SignalDraft::announce(peer.clone()),
                &SessionKey::new("S1"),
            )
            .await;

        // Sink untouched, broadcast delivered anyway.
        assert!(rig.sink.calls().is_empty());
        let (_, message) = read_delivery(&mut reader).await;
        assert_eq!(message.kind, SignalKind::PeerOnline);
        assert_eq!(message.from, peer);
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_abort_routing() {
        let registry = spawn_registry();
        let broker = ChannelBroker::new();
        let router = SignalingRouter::new(
            registry.clone(),
            broker.clone(),
            Arc::new(FailingSink),
            Arc::new(EmptyGroupDirectory),
        );

        let (rx, tx) = tokio::io::duplex(16 * 1024);
        broker
            .subscribe(SessionKey::new("S5"), Channel::AllPeers, subscriber_writer(tx))
            .await
            .unwrap();
        let mut reader = BufReader::new(rx);

        router
            .dispatch(
                SignalKind::PeerOnline,
                SignalDraft::announce(PeerId::new("peer-7-abc")),
                &SessionKey::new("S1"),
            )
            .await;

        // Registration and broadcast both survive the sink failure.
        assert!(registry
            .lookup_session(PeerId::new("peer-7-abc"))
            .await
            .is_some());
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert!(line.contains("PEER_ONLINE"));
    }

    #[tokio::test]
    async fn test_group_fanout_retargets_each_member() {
        let groups = StaticGroupDirectory::new().with_group(
            GroupId::new(5),
            vec![PeerId::new("peer-1-a"), PeerId::new("peer-2-b")],
        );
        let rig = rig_with_groups(groups);

        let mut reader_a = subscribe(
            &rig.broker,
            "S1",
            Channel::Personal(PeerId::new("peer-1-a")),
        )
        .await;
        let mut reader_b = subscribe(
            &rig.broker,
            "S2",
            Channel::Personal(PeerId::new("peer-2-b")),
        )
        .await;

        let payload = serde_json::json!({"groupId": 5, "groupName": "rustaceans"});
        let draft = SignalDraft {
            from: PeerId::new("peer-1-a"),
            to: None,
            payload: Some(payload.clone()),
        };
        rig.router
            .dispatch(SignalKind::GroupMemberJoined, draft, &SessionKey::new("S1"))
            .await;

        let (_, msg_a) = read_delivery(&mut reader_a).await;
        assert_eq!(msg_a.kind, SignalKind::GroupMemberJoined);
        assert_eq!(msg_a.to, Some(PeerId::new("peer-1-a")));
        assert_eq!(msg_a.payload, Some(payload.clone()));

        let (_, msg_b) = read_delivery(&mut reader_b).await;
        assert_eq!(msg_b.to, Some(PeerId::new("peer-2-b")));
    }

    #[tokio::test]
    async fn test_group_fanout_without_group_id_is_dropped() {
        let rig = rig();
        let draft = SignalDraft {
            from: PeerId::new("peer-1-a"),
            to: None,
            payload: Some(serde_json::json!({"groupName": "no id"})),
        };
        // Must not panic or deliver anything.
        rig.router
            .dispatch(SignalKind::GroupMemberLeft, draft, &SessionKey::new("S1"))
            .await;
    }

    #[tokio::test]
    async fn test_timestamps_non_decreasing_in_dispatch_order() {
        let rig = rig();
        let target = PeerId::new("peer-7-abc");
        rig.registry
            .register(target.clone(), SessionKey::new("S1"))
            .await
            .unwrap();
        let mut reader =
            subscribe(&rig.broker, "S1", Channel::Personal(target.clone())).await;

        let mut last = i64::MIN;
        for _ in 0..5 {
            let draft = SignalDraft::to_peer(PeerId::new("peer-9-xyz"), target.clone(), None);
            rig.router
                .dispatch(SignalKind::IceCandidate, draft, &SessionKey::new("S9"))
                .await;
            let (_, message) = read_delivery(&mut reader).await;
            assert!(message.timestamp >= last);
            last = message.timestamp;
        }
    }
}
