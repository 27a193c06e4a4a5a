//! # Content Filter Node
//!
//! Runs a filter full node or light node over TCP.
//!
//! ## Startup Sequence
//!
//! 1. Install logging (`RUST_LOG`, default `info`)
//! 2. Load configuration from `FILTER_*` environment variables
//! 3. Bind the TCP transport and start the selected role
//! 4. Run until Ctrl+C, then shut down gracefully
//!
//! ## Example
//!
//! ```text
//! FILTER_ROLE=full FILTER_LISTEN_ADDR=127.0.0.1:60000 node-runtime
//! FILTER_ROLE=light FILTER_LISTEN_ADDR=127.0.0.1:60001 \
//!     FILTER_SERVICE_PEER=<full peer hex>@127.0.0.1:60000 \
//!     FILTER_CONTENT_TOPICS=weather node-runtime
//! ```
//!
//! Lines typed into the full node's stdin (`weather sunny`) are relayed to
//! every matching subscriber.

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use node_runtime::{run, NodeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let config = NodeConfig::from_env().context("Invalid FILTER_* configuration")?;
    config.validate().context("Incomplete configuration")?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            // Keep the sender alive so the node is not shut down.
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    run(config, shutdown_rx).await
}
