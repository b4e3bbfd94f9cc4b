use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod config;
mod policy;
mod sim;

use crate::config::Config;
use crate::sim::Simulator;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(config.log_level()?)
        .init();

    // Validate configuration
    config.validate()?;

    info!(
        "Starting simulator: {} sessions, seed {}, max drag {}",
        config.sessions, config.seed, config.max_drag_len
    );
    if let Some(path) = &config.engine_config {
        info!("Engine config: {}", path.display());
    }

    let simulator = Arc::new(Simulator::new(config)?);

    // Setup graceful shutdown
    let shutdown_simulator = Arc::clone(&simulator);
    let shutdown_handle = tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping simulator...");
                shutdown_simulator.shutdown().await;
            }
            Err(e) => error!("Failed to listen for ctrl+c: {}", e),
        }
    });

    let run_result = simulator.run().await;

    shutdown_handle.abort();

    match run_result {
        Ok(results) => {
            info!("Simulator completed {} sessions", results.len());
            Ok(())
        }
        Err(e) => {
            error!("Simulator failed: {}", e);
            Err(e)
        }
    }
}
