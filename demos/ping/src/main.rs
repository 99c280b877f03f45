//! Ping/pong over a post-channel.
//!
//! Demonstrates the handshake, ordered sends and delivery receipts:
//! - Both peers in one process over an in-memory pair
//! - Or across processes over WebSocket
//!
//! Run in one process:
//!   cargo run -p postchannel-demo-ping -- loopback --rounds 5
//!
//! Run across two processes:
//!   cargo run -p postchannel-demo-ping -- serve --addr 127.0.0.1:9001
//!   cargo run -p postchannel-demo-ping -- connect ws://127.0.0.1:9001

mod protocol;
mod server;

use clap::{Parser, Subcommand};
use postchannel::ChannelConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ping", about = "Ping/pong over a post-channel")]
struct Args {
    /// Channel settings file (TOML).
    #[arg(long, env = "PING_CONFIG")]
    config: Option<PathBuf>,

    /// Syn period in milliseconds; overrides the config file.
    #[arg(long, env = "PING_PERIOD_MS")]
    period_ms: Option<u64>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Run both peers in this process.
    Loopback {
        #[arg(long, default_value_t = 3)]
        rounds: u32,
    },
    /// Answer pings from WebSocket clients.
    Serve {
        #[arg(long, default_value = "127.0.0.1:9001")]
        addr: SocketAddr,
    },
    /// Ping a WebSocket server.
    Connect {
        url: String,
        #[arg(long, default_value_t = 3)]
        rounds: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ping=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ChannelConfig::load(path)?,
        None => ChannelConfig::default(),
    };
    if let Some(period_ms) = args.period_ms {
        config.period_ms = period_ms;
    }

    match args.mode {
        Mode::Loopback { rounds } => server::loopback(&config, rounds).await,
        Mode::Serve { addr } => server::serve(&config, addr).await,
        Mode::Connect { url, rounds } => server::connect(&config, &url, rounds).await,
    }
}
