//! Channel broker - the topic/subscription delivery mechanism.
//!
//! Connections subscribe their writer to named channels; the router
//! publishes signaling messages to a channel and the broker fans them
//! out to every subscriber. Delivery is fire-and-forget: one bounded
//! write per subscriber, no ack, no retry, no queueing. A subscriber
//! whose write fails or times out is pruned on the spot.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Failed writes are logged and result in subscriber removal

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use switchboard_core::SessionKey;
use switchboard_protocol::{Channel, RelayFrame, SignalingMessage};

/// Write timeout for a single delivery (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum subscriptions one session may hold across all channels.
///
/// A chat client needs three or four (all-peers, own personal topic,
/// own inbox); the cap only guards the map against a runaway client.
pub const MAX_SUBSCRIPTIONS_PER_SESSION: usize = 32;

/// Boxed async writer so the broker is not tied to one transport type.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Shared writer handle for one subscribed connection.
pub type SubscriberWriter = Arc<Mutex<BufWriter<BoxedWriter>>>;

/// Wraps a raw writer into the shared handle the broker expects.
pub fn subscriber_writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> SubscriberWriter {
    Arc::new(Mutex::new(BufWriter::new(Box::new(writer))))
}

/// Errors that can occur in broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("too many subscriptions for one session (max: {max})")]
    TooManySubscriptions { max: usize },
}

/// Topic/subscription broker.
///
/// Cheap to clone; all clones share the same channel table behind an
/// async RwLock.
#[derive(Clone, Default)]
pub struct ChannelBroker {
    channels: Arc<RwLock<HashMap<Channel, HashMap<SessionKey, SubscriberWriter>>>>,
}

impl ChannelBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a session's writer to a channel.
    ///
    /// Re-subscribing to the same channel replaces the stored writer,
    /// which is a no-op in practice since a session has one writer.
    pub async fn subscribe(
        &self,
        session: SessionKey,
        channel: Channel,
        writer: SubscriberWriter,
    ) -> Result<(), BrokerError> {
        let mut channels = self.channels.write().await;

        let held: usize = channels
            .values()
            .filter(|subs| subs.contains_key(&session))
            .count();
        let already = channels
            .get(&channel)
            .is_some_and(|subs| subs.contains_key(&session));
        if !already && held >= MAX_SUBSCRIPTIONS_PER_SESSION {
            return Err(BrokerError::TooManySubscriptions {
                max: MAX_SUBSCRIPTIONS_PER_SESSION,
            });
        }

        channels
            .entry(channel.clone())
            .or_default()
            .insert(session.clone(), writer);

        debug!(session = %session, channel = %channel, "Subscribed");
        Ok(())
    }

    /// Drops one subscription. Idempotent.
    pub async fn unsubscribe(&self, session: &SessionKey, channel: &Channel) {
        let mut channels = self.channels.write().await;
        if let Some(subs) = channels.get_mut(channel) {
            if subs.remove(session).is_some() {
                debug!(session = %session, channel = %channel, "Unsubscribed");
            }
            if subs.is_empty() {
                channels.remove(channel);
            }
        }
    }

    /// Removes a session from every channel. Disconnect sweep.
    pub async fn drop_session(&self, session: &SessionKey) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, subs| {
            subs.remove(session);
            !subs.is_empty()
        });
        debug!(session = %session, "Dropped session subscriptions");
    }

    /// Publishes a message to every subscriber of a channel.
    ///
    /// Serializes one delivery frame, writes it to each subscriber under
    /// a bounded timeout, and prunes subscribers whose write fails.
    /// Returns the number of successful deliveries; zero subscribers is
    /// not an error.
    pub async fn publish(&self, channel: Channel, message: SignalingMessage) -> usize {
        let frame = RelayFrame::delivery(channel.clone(), message);
        let json = match serde_json::to_string(&frame) {
            Ok(j) => j,
            Err(e) => {
                error!(channel = %channel, error = %e, "Failed to serialize delivery");
                return 0;
            }
        };

        let subscribers: Vec<(SessionKey, SubscriberWriter)> = {
            let channels = self.channels.read().await;
            match channels.get(&channel) {
                Some(subs) => subs
                    .iter()
                    .map(|(s, w)| (s.clone(), Arc::clone(w)))
                    .collect(),
                None => Vec::new(),
            }
        };

        let mut delivered = 0;
        let mut failed: Vec<SessionKey> = Vec::new();

        for (session, writer) in subscribers {
            match write_line(&writer, &json).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        session = %session,
                        channel = %channel,
                        error = %e,
                        "Delivery failed, pruning subscriber"
                    );
                    failed.push(session);
                }
            }
        }

        if !failed.is_empty() {
            let mut channels = self.channels.write().await;
            if let Some(subs) = channels.get_mut(&channel) {
                for session in failed {
                    subs.remove(&session);
                }
                if subs.is_empty() {
                    channels.remove(&channel);
                }
            }
        }

        delivered
    }

    /// Number of subscribers currently on a channel. Diagnostics.
    pub async fn subscriber_count(&self, channel: &Channel) -> usize {
        self.channels
            .read()
            .await
            .get(channel)
            .map_or(0, HashMap::len)
    }
}

/// Writes one newline-terminated frame under the write timeout.
pub(crate) async fn write_line(writer: &SubscriberWriter, json: &str) -> Result<(), std::io::Error> {
    let mut writer = writer.lock().await;

    match timeout(WRITE_TIMEOUT, async {
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok::<(), std::io::Error>(())
    })
    .await
    {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "write timed out",
        )),
    }
}
