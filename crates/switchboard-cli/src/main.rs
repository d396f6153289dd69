//! Switchboard diagnostics client
//!
//! Small command-line client for a running relay daemon.
//!
//! # Usage
//!
//! ```bash
//! # List registered peers
//! switchboard peers
//!
//! # Stream all presence broadcasts (and one peer's personal channel)
//! switchboard watch --peer peer-7-abc
//!
//! # Announce a peer online, hold until Ctrl+C, then announce offline
//! switchboard announce --peer peer-7-abc
//!
//! # Inject one signal
//! switchboard send --endpoint OFFER --from peer-9-xyz --to peer-7-abc \
//!     --payload '{"sdp":"v=0..."}'
//!
//! # Talk to a relay on a non-default address
//! SWITCHBOARD_ADDR=10.0.0.5:9753 switchboard peers
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use switchboard_cli::RelayClient;
use switchboard_core::PeerId;
use switchboard_protocol::{Channel, SignalDraft, SignalKind};

/// Default relay address, matching the daemon's compiled default.
const DEFAULT_ADDR: &str = "127.0.0.1:9753";

/// Environment variable overriding the relay address
const ADDR_ENV: &str = "SWITCHBOARD_ADDR";

/// Switchboard relay diagnostics client
#[derive(Parser, Debug)]
#[command(name = "switchboard", version, about)]
struct Args {
    /// Relay address (overrides SWITCHBOARD_ADDR)
    #[arg(long)]
    addr: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered peer identities
    Peers,

    /// Stream deliveries from the all-peers channel (and optionally one
    /// peer's personal channel) until Ctrl+C
    Watch {
        /// Also watch this peer's personal channel
        #[arg(long)]
        peer: Option<String>,
    },

    /// Announce a peer online, hold the connection, announce offline on
    /// Ctrl+C
    Announce {
        /// Peer identity to announce
        #[arg(long)]
        peer: String,
    },

    /// Send one signaling event and exit
    Send {
        /// Signal kind token (e.g. OFFER, CALL_REQUEST, TYPING)
        #[arg(long)]
        endpoint: SignalKind,

        /// Sender peer identity
        #[arg(long)]
        from: String,

        /// Target peer identity
        #[arg(long)]
        to: Option<String>,

        /// JSON payload
        #[arg(long)]
        payload: Option<String>,
    },
}

fn relay_addr(args: &Args) -> String {
    args.addr
        .clone()
        .or_else(|| std::env::var(ADDR_ENV).ok())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("switchboard_cli=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let addr = relay_addr(&args);

    match args.command {
        Command::Peers => cmd_peers(&addr).await,
        Command::Watch { peer } => cmd_watch(&addr, peer).await,
        Command::Announce { peer } => cmd_announce(&addr, peer).await,
        Command::Send {
            endpoint,
            from,
            to,
            payload,
        } => cmd_send(&addr, endpoint, from, to, payload).await,
    }
}

/// Attach, list the roster, detach.
async fn cmd_peers(addr: &str) -> Result<()> {
    let mut client = RelayClient::connect(addr)
        .await
        .with_context(|| format!("Failed to attach to relay at {addr}"))?;

    let peers = client.list_peers().await?;

    if peers.is_empty() {
        println!("No peers registered.");
    } else {
        for peer in &peers {
            println!("{peer}");
        }
    }

    client.detach().await?;
    Ok(())
}

/// Subscribe and stream deliveries until Ctrl+C.
async fn cmd_watch(addr: &str, peer: Option<String>) -> Result<()> {
    let mut client = RelayClient::connect(addr)
        .await
        .with_context(|| format!("Failed to attach to relay at {addr}"))?;

    if let Some(roster) = client.subscribe(Channel::AllPeers).await? {
        eprintln!("Watching {} (currently {} registered)", addr, roster.len());
    }

    if let Some(peer) = peer {
        let channel = Channel::Personal(PeerId::new(peer));
        client.subscribe(channel.clone()).await?;
        eprintln!("Also watching {channel}");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Stopping.");
                break;
            }
            delivery = client.next_delivery() => {
                let (channel, message) = delivery?;
                let payload = message
                    .payload
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_default();
                println!(
                    "{} {} from={} to={} {}",
                    message.timestamp,
                    message.kind,
                    message.from,
                    message.to.as_ref().map_or("-", |p| p.as_str()),
                    payload
                );
                // Channel shown only when it disambiguates.
                tracing::debug!(channel = %channel, "Delivery");
            }
        }
    }

    client.detach().await?;
    Ok(())
}

/// Announce a peer online and hold until Ctrl+C.
async fn cmd_announce(addr: &str, peer: String) -> Result<()> {
    let peer = PeerId::new(peer);
    let mut client = RelayClient::connect(addr)
        .await
        .with_context(|| format!("Failed to attach to relay at {addr}"))?;

    client
        .signal(SignalKind::PeerOnline, SignalDraft::announce(peer.clone()))
        .await?;
    eprintln!("Announced {peer} online on session {}. Ctrl+C to go offline.", client.session());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    client
        .signal(SignalKind::PeerOffline, SignalDraft::announce(peer.clone()))
        .await?;
    eprintln!("Announced {peer} offline.");

    client.detach().await?;
    Ok(())
}

/// One-shot signal injection.
async fn cmd_send(
    addr: &str,
    endpoint: SignalKind,
    from: String,
    to: Option<String>,
    payload: Option<String>,
) -> Result<()> {
    let payload = payload
        .map(|p| serde_json::from_str(&p).context("Invalid JSON payload"))
        .transpose()?;

    let draft = SignalDraft {
        from: PeerId::new(from),
        to: to.map(PeerId::new),
        payload,
    };

    let mut client = RelayClient::connect(addr)
        .await
        .with_context(|| format!("Failed to attach to relay at {addr}"))?;

    client.signal(endpoint, draft).await?;
    client.detach().await?;

    Ok(())
}
