//! CLI interface for nfc-realtime
//!
//! Provides subcommands for:
//! - `listen`: Print every realtime message as a JSON line
//! - `send`: Send one JSON message and exit
//! - `track`: Follow attendance activity and totals
//! - `config`: Show the effective configuration

mod listen;
mod send;
mod track;

pub use listen::ListenArgs;
pub use send::SendArgs;
pub use track::TrackArgs;

use crate::realtime::RealtimeClient;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "nfc-realtime")]
#[command(about = "Realtime update client for the NFC access-control dashboard")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,

    /// Override the realtime endpoint URL
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print every realtime message as a JSON line
    Listen(ListenArgs),
    /// Send one JSON message and exit
    Send(SendArgs),
    /// Follow attendance activity and totals
    Track(TrackArgs),
    /// Show the effective configuration
    Config,
}

/// Wait for Ctrl-C, then close the client
async fn run_until_interrupted(client: &RealtimeClient) -> anyhow::Result<()> {
    let mut states = client.state_changes();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Interrupted, closing realtime connection");
        }
        _ = states.wait_for(|s| !s.is_active() && *s != crate::realtime::ConnectionState::Idle) => {
            tracing::warn!(state = %client.state(), "Realtime connection stopped");
        }
    }
    client.shutdown().await;
    Ok(())
}
