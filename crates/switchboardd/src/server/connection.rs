//! Connection handler for individual client connections.
//!
//! Each accepted socket gets its own `ConnectionHandler` that:
//! - Performs the attach handshake (protocol version check, session mint)
//! - Parses newline-delimited JSON frames
//! - Dispatches signals to the router and subscriptions to the broker
//! - Fires the lifecycle disconnect hook on every exit path
//!
//! There is deliberately no idle read timeout: a silent peer that is
//! only listening for deliveries stays connected until it hangs up or
//! its socket dies.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in graceful disconnect

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use switchboard_core::SessionKey;
use switchboard_protocol::{
    is_supported, Channel, ClientCommand, ClientFrame, RelayFrame, PROTOCOL_VERSION,
};

use crate::broker::{subscriber_writer, ChannelBroker, SubscriberWriter};
use crate::lifecycle::LifecycleHandler;
use crate::registry::RegistryHandle;
use crate::router::SignalingRouter;

/// Maximum frame size (64 KB). Signaling payloads are SDP blobs and ICE
/// candidates; anything larger is a protocol violation.
const MAX_FRAME_SIZE: usize = 65_536;

/// Connection handler for a single client.
pub struct ConnectionHandler {
    /// Buffered reader for incoming frames
    reader: BufReader<OwnedReadHalf>,

    /// Shared writer, also registered with the broker on subscribe
    writer: SubscriberWriter,

    registry: RegistryHandle,
    router: SignalingRouter,
    lifecycle: LifecycleHandler,
    broker: ChannelBroker,

    /// Session handle minted at attach time
    session: Option<SessionKey>,

    /// Connection number used to mint the session handle
    connection_number: u64,

    cancel_token: CancellationToken,
}

impl ConnectionHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        registry: RegistryHandle,
        router: SignalingRouter,
        lifecycle: LifecycleHandler,
        broker: ChannelBroker,
        connection_number: u64,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: subscriber_writer(writer),
            registry,
            router,
            lifecycle,
            broker,
            session: None,
            connection_number,
            cancel_token,
        }
    }

    /// Runs the connection to completion.
    ///
    /// Performs the attach handshake, then processes frames until the
    /// client detaches, the socket dies, or the server shuts down. On
    /// every exit path after a successful attach, the session is swept
    /// from the broker and the lifecycle disconnect hook runs.
    pub async fn run(mut self) {
        debug!(connection = self.connection_number, "New client connected");

        match self.handle_handshake().await {
            Ok(()) => {}
            Err(e) => {
                debug!(
                    connection = self.connection_number,
                    error = %e,
                    "Handshake failed"
                );
                return;
            }
        }

        if let Err(e) = self.process_frames().await {
            debug!(session = ?self.session, error = %e, "Connection closed");
        }

        if let Some(session) = self.session.take() {
            self.broker.drop_session(&session).await;
            self.lifecycle.on_disconnect(&session).await;
        }
    }

    /// Handles the attach handshake.
    ///
    /// The first frame must be `Attach` with a supported protocol
    /// version; the relay mints the session handle and replies
    /// `Attached`. Anything else gets `Rejected` and the connection is
    /// dropped without ever entering the session's lifecycle.
    async fn handle_handshake(&mut self) -> Result<(), ConnectionError> {
        let frame = self.read_frame().await?;

        if !is_supported(frame.v) {
            warn!(
                client_version = frame.v,
                server_version = PROTOCOL_VERSION,
                "Protocol version not supported"
            );
            self.send_frame(RelayFrame::rejected(&format!(
                "protocol version {} not supported (server speaks {})",
                frame.v, PROTOCOL_VERSION
            )))
            .await?;
            return Err(ConnectionError::VersionMismatch {
                client: frame.v,
                server: PROTOCOL_VERSION,
            });
        }

        match frame.command {
            ClientCommand::Attach => {
                let session = SessionKey::new(format!("sess-{}", self.connection_number));
                self.session = Some(session.clone());

                self.send_frame(RelayFrame::attached(session.clone())).await?;
                self.lifecycle.on_connect(&session);
                Ok(())
            }
            other => {
                self.send_frame(RelayFrame::rejected("expected attach frame"))
                    .await?;
                Err(ConnectionError::UnexpectedFrame(format!("{other:?}")))
            }
        }
    }

    /// Main frame processing loop.
    ///
    /// No read timeout by design; the loop ends on EOF, detach, a fatal
    /// I/O error, or server shutdown.
    async fn process_frames(&mut self) -> Result<(), ConnectionError> {
        // Cloned so the select arm does not hold a borrow of self while
        // read_frame needs it mutably.
        let cancel_token = self.cancel_token.clone();
        loop {
            let frame = tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!(session = ?self.session, "Server shutting down, closing connection");
                    return Ok(());
                }
                result = self.read_frame() => match result {
                    Ok(frame) => frame,
                    Err(ConnectionError::Eof) => {
                        debug!(session = ?self.session, "Client sent EOF");
                        return Ok(());
                    }
                    Err(ConnectionError::Parse(e)) => {
                        // The line was consumed, so the stream resyncs
                        // on the next newline; drop the frame only.
                        warn!(session = ?self.session, error = %e, "Dropping malformed frame");
                        self.send_frame(RelayFrame::error(&format!("malformed frame: {e}")))
                            .await?;
                        continue;
                    }
                    Err(e) => return Err(e),
                },
            };

            match self.handle_frame(frame).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => {
                    // Malformed-but-parseable commands keep the
                    // connection alive; only I/O failures end it.
                    warn!(session = ?self.session, error = %e, "Error handling frame");
                    self.send_frame(RelayFrame::error(&e.to_string())).await?;
                }
            }
        }
    }

    /// Handles one client frame. Returns `Ok(true)` on detach.
    async fn handle_frame(&mut self, frame: ClientFrame) -> Result<bool, ConnectionError> {
        // Attach minted this before the loop started.
        let Some(session) = self.session.clone() else {
            return Err(ConnectionError::NotAttached);
        };

        match frame.command {
            ClientCommand::Attach => {
                self.send_frame(RelayFrame::error("already attached")).await?;
            }

            ClientCommand::Signal { endpoint, message } => {
                self.router.dispatch(endpoint, message, &session).await;
            }

            ClientCommand::Subscribe { channel } => {
                let snapshot_wanted = channel == Channel::AllPeers;

                self.broker
                    .subscribe(session.clone(), channel, self.writer.clone())
                    .await
                    .map_err(|e| ConnectionError::Subscription(e.to_string()))?;

                // Joining the presence channel gets the current roster
                // so the client starts from a consistent picture.
                if snapshot_wanted {
                    let peers = self.registry.list_peers().await;
                    self.send_frame(RelayFrame::peer_list(peers)).await?;
                }
            }

            ClientCommand::Unsubscribe { channel } => {
                self.broker.unsubscribe(&session, &channel).await;
            }

            ClientCommand::ListPeers => {
                let peers = self.registry.list_peers().await;
                self.send_frame(RelayFrame::peer_list(peers)).await?;
            }

            ClientCommand::Ping { seq } => {
                self.send_frame(RelayFrame::pong(seq)).await?;
            }

            ClientCommand::Detach => {
                info!(session = %session, "Client detached");
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Reads a single frame from the client.
    async fn read_frame(&mut self) -> Result<ClientFrame, ConnectionError> {
        let mut line = String::new();

        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }

        if line.len() > MAX_FRAME_SIZE {
            return Err(ConnectionError::FrameTooLarge {
                size: line.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        serde_json::from_str(&line).map_err(|e| ConnectionError::Parse(e.to_string()))
    }

    /// Sends one frame to this client directly (responses, not
    /// deliveries; deliveries go through the broker).
    async fn send_frame(&self, frame: RelayFrame) -> Result<(), ConnectionError> {
        let json =
            serde_json::to_string(&frame).map_err(|e| ConnectionError::Parse(e.to_string()))?;
        crate::broker::write_line(&self.writer, &json)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("protocol version mismatch: client {client}, server {server}")]
    VersionMismatch { client: u16, server: u16 },

    #[error("unexpected frame: {0}")]
    UnexpectedFrame(String),

    #[error("frame received before attach")]
    NotAttached,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("connection closed")]
    Eof,

    #[error("subscription error: {0}")]
    Subscription(String),

    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },
}
