//! Telemetry relay binary.
//!
//! Usage: `telemetry-relay [config.yaml]`

use anyhow::Context;
use std::path::Path;
use telemetry_relay::{Relay, RelayConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            RelayConfig::load(Path::new(&path))
                .with_context(|| format!("failed to load configuration from {path}"))?
        }
        None => {
            info!("Using default configuration");
            RelayConfig::default()
        }
    };
    config.apply_env().context("invalid port override")?;

    info!("telemetry-relay v{}", env!("CARGO_PKG_VERSION"));

    let relay = match Relay::start(config).await {
        Ok(relay) => relay,
        Err(e) => {
            error!(error = %e, "Relay failed to start");
            for suggestion in e.recovery_suggestions() {
                error!("  - {}", suggestion);
            }
            return Err(e.into());
        }
    };

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("Ctrl-C received");

    relay.shutdown().await;
    Ok(())
}
