//! Line-JSON client for the relay's TCP protocol.
//!
//! One connection, one attach handshake, then frames in both directions.
//! No reconnection logic: this is a diagnostics tool, and a dropped
//! relay connection should surface immediately rather than be papered
//! over.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use switchboard_core::{PeerId, SessionKey};
use switchboard_protocol::{
    Channel, ClientFrame, RelayFrame, SignalDraft, SignalKind, SignalingMessage,
};

use crate::error::ClientError;

/// Client for one attached relay connection.
pub struct RelayClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,

    /// Session handle minted by the relay at attach time
    session: SessionKey,
}

impl RelayClient {
    /// Connects to the relay and performs the attach handshake.
    ///
    /// # Errors
    ///
    /// - `ClientError::Connect` if the TCP connection fails
    /// - `ClientError::Rejected` if the relay refuses the attach
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ClientError::Connect {
                addr: addr.to_string(),
                error: e.to_string(),
            })?;

        let (reader, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            session: SessionKey::new(""),
        };

        client.send(ClientFrame::attach()).await?;
        match client.read_frame().await? {
            RelayFrame::Attached { session, .. } => {
                debug!(session = %session, "Attached to relay");
                client.session = session;
                Ok(client)
            }
            RelayFrame::Rejected { reason, .. } => Err(ClientError::Rejected(reason)),
            other => Err(ClientError::UnexpectedFrame(format!("{other:?}"))),
        }
    }

    /// The session handle the relay assigned to this connection.
    pub fn session(&self) -> &SessionKey {
        &self.session
    }

    /// Requests the current roster of registered peer identities.
    pub async fn list_peers(&mut self) -> Result<Vec<PeerId>, ClientError> {
        self.send(ClientFrame::list_peers()).await?;
        match self.read_frame().await? {
            RelayFrame::PeerList { peers } => Ok(peers),
            other => Err(ClientError::UnexpectedFrame(format!("{other:?}"))),
        }
    }

    /// Subscribes this connection to a delivery channel.
    ///
    /// Subscribing to the all-peers channel returns the roster snapshot
    /// the relay sends along with the subscription.
    pub async fn subscribe(&mut self, channel: Channel) -> Result<Option<Vec<PeerId>>, ClientError> {
        let wants_snapshot = channel == Channel::AllPeers;
        self.send(ClientFrame::subscribe(channel)).await?;

        if wants_snapshot {
            match self.read_frame().await? {
                RelayFrame::PeerList { peers } => Ok(Some(peers)),
                other => Err(ClientError::UnexpectedFrame(format!("{other:?}"))),
            }
        } else {
            Ok(None)
        }
    }

    /// Sends one signaling event to the relay. Fire-and-forget: the
    /// relay never acknowledges signals.
    pub async fn signal(
        &mut self,
        endpoint: SignalKind,
        draft: SignalDraft,
    ) -> Result<(), ClientError> {
        self.send(ClientFrame::signal(endpoint, draft)).await
    }

    /// Waits for the next delivery on any subscribed channel, skipping
    /// unrelated response frames.
    pub async fn next_delivery(&mut self) -> Result<(Channel, SignalingMessage), ClientError> {
        loop {
            match self.read_frame().await? {
                RelayFrame::Delivery { channel, message } => return Ok((channel, message)),
                other => {
                    debug!(frame = ?other, "Skipping non-delivery frame");
                }
            }
        }
    }

    /// Detaches gracefully. The relay sweeps this session's
    /// subscriptions and registration on receipt.
    pub async fn detach(mut self) -> Result<(), ClientError> {
        self.send(ClientFrame::detach()).await
    }

    /// Sends one frame.
    pub async fn send(&mut self, frame: ClientFrame) -> Result<(), ClientError> {
        let json = serde_json::to_string(&frame)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Reads the next frame from the relay.
    pub async fn read_frame(&mut self) -> Result<RelayFrame, ClientError> {
        let mut line = String::new();
        let bytes_read = self.reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            return Err(ClientError::Disconnected);
        }

        Ok(serde_json::from_str(&line)?)
    }
}
