//! TCP server for the switchboard relay daemon.
//!
//! The server:
//! - Listens on a TCP socket for client connections
//! - Spawns a ConnectionHandler for each accepted socket
//! - Shares one registry, router, broker, and lifecycle handler
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│ SignalingRouter │
//! │  (per client)   │     │                 │
//! └───────┬─────────┘     └─────────────────┘
//!         │ subscribe / deliver
//!         ▼
//! ┌─────────────────┐
//! │  ChannelBroker  │
//! │  (subscribers)  │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept errors are logged and the loop keeps accepting

mod connection;

pub use connection::{ConnectionError, ConnectionHandler};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::broker::ChannelBroker;
use crate::directory::{AccountStatusSink, GroupDirectory};
use crate::lifecycle::LifecycleHandler;
use crate::registry::{spawn_registry, RegistryHandle};
use crate::router::SignalingRouter;

/// Default listen address
pub const DEFAULT_ADDR: &str = "127.0.0.1:9753";

/// Environment variable overriding the listen address
pub const ADDR_ENV: &str = "SWITCHBOARD_ADDR";

/// Returns the configured listen address: `SWITCHBOARD_ADDR` if set,
/// the compiled default otherwise.
pub fn listen_addr() -> String {
    std::env::var(ADDR_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_string())
}

/// TCP server for the relay daemon.
pub struct RelayServer {
    listener: TcpListener,
    registry: RegistryHandle,
    router: SignalingRouter,
    lifecycle: LifecycleHandler,
    broker: ChannelBroker,
    cancel_token: CancellationToken,

    /// Connection counter for minting session handles
    connection_counter: AtomicU64,
}

impl RelayServer {
    /// Binds the listener and assembles the relay core around it.
    ///
    /// Spawns the registry actor; the collaborator implementations are
    /// injected so an embedding service can wire its own.
    ///
    /// # Errors
    ///
    /// - `ServerError::Bind` if the address cannot be bound
    pub async fn bind(
        addr: &str,
        accounts: Arc<dyn AccountStatusSink>,
        groups: Arc<dyn GroupDirectory>,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| ServerError::Bind {
            addr: addr.to_string(),
            error: e.to_string(),
        })?;

        let registry = spawn_registry();
        let broker = ChannelBroker::new();
        let router = SignalingRouter::new(registry.clone(), broker.clone(), accounts, groups);
        let lifecycle = LifecycleHandler::new(registry.clone(), router.clone());

        Ok(Self {
            listener,
            registry,
            router,
            lifecycle,
            broker,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// The address the listener actually bound (useful when binding
    /// port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(|e| ServerError::Bind {
            addr: "local".to_string(),
            error: e.to_string(),
        })
    }

    /// Handle to the registry, for embedding and diagnostics.
    pub fn registry(&self) -> RegistryHandle {
        self.registry.clone()
    }

    /// Runs the accept loop until the cancellation token fires.
    ///
    /// This method does not return until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        match self.local_addr() {
            Ok(addr) => info!(addr = %addr, "Relay server listening"),
            Err(_) => info!("Relay server listening"),
        }

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            info!(addr = %addr, connection = conn_num, "Accepted connection");
                            self.handle_connection(stream, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Spawns the handler task for one accepted socket.
    fn handle_connection(&self, stream: tokio::net::TcpStream, connection_number: u64) {
        let (reader, writer) = stream.into_split();

        let handler = ConnectionHandler::new(
            reader,
            writer,
            self.registry.clone(),
            self.router.clone(),
            self.lifecycle.clone(),
            self.broker.clone(),
            connection_number,
            self.cancel_token.clone(),
        );

        tokio::spawn(handler.run());
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {error}")]
    Bind { addr: String, error: String },

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_addr() {
        assert_eq!(DEFAULT_ADDR, "127.0.0.1:9753");
    }

    #[test]
    fn test_bind_error_display() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:9753".to_string(),
            error: "address in use".to_string(),
        };
        assert!(err.to_string().contains("127.0.0.1:9753"));
        assert!(err.to_string().contains("address in use"));
    }
}
