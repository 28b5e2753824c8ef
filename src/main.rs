//! Position Bridge Server
//!
//! Receives positions from the PS2 client over HTTP and serves the latest
//! one to the Roblox client.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use position_bridge::{BridgeServer, ServerConfig, SERVICE_NAME, STALE_THRESHOLD_MS, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let default_level = if cfg!(feature = "debug-tracing") {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = ServerConfig::from_env().context("Invalid configuration")?;

    info!("{} v{}", SERVICE_NAME, VERSION);
    info!("Started at {}", Utc::now().to_rfc3339());
    info!("Environment: {}", config.environment);
    info!("Coordinate policy: {}", config.coordinate_policy);
    info!("Stale after {} ms", STALE_THRESHOLD_MS);

    let server = Arc::new(BridgeServer::new(config));

    // Ctrl-C triggers graceful shutdown
    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                signal_server.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run().await.context("Server error")?;

    info!("Bridge stopped");
    Ok(())
}
