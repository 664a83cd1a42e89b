//! # Group-Chain Node Runtime
//!
//! Entry point: brings up a producer and a follower for one group, lets the
//! follower sync the producer's chain, and shuts both down.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG`, default `info`)
//! 2. Load configuration (defaults + `GC_*` environment variables)
//! 3. Create the group and the producer, produce the demo chain
//! 4. Join the follower and start forward sync
//! 5. Wait for the follower to settle or Ctrl+C
//! 6. Graceful shutdown

use std::time::Duration;

use anyhow::{Context, Result};
use node_runtime::{NodeConfig, NodeRuntime};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn load_config() -> Result<NodeConfig> {
    let config = NodeConfig::from_env().context("invalid GC_* configuration")?;
    info!(config = %serde_json::to_string(&config)?, "Configuration loaded");
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config()?;

    info!("===========================================");
    info!("  Group-Chain Node Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let mut runtime = NodeRuntime::new(config)?;
    runtime.start().await?;

    tokio::select! {
        report = runtime.wait_for_sync(Duration::from_millis(50)) => {
            let report = report?;
            if report.follower_tip == report.producer_tip {
                info!(
                    height = report.follower_tip.height,
                    tip = %report.follower_tip.block_id,
                    status = %report.follower_status,
                    "Follower in sync with producer"
                );
            } else {
                error!(
                    producer = ?report.producer_tip,
                    follower = ?report.follower_tip,
                    status = %report.follower_status,
                    "Follower did not converge"
                );
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            warn!("Interrupted before sync finished");
        }
    }

    runtime.shutdown().await;
    Ok(())
}
