//! `chainfeed run`: start the bridge and stop it on a shutdown signal.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use chainfeed::{init_tracing, Bridge, BridgeConfig, MemoryQueue};

pub async fn run(config_path: Option<&Path>, dry_run: bool) -> Result<()> {
    let config = BridgeConfig::load(config_path).context("loading configuration")?;
    init_tracing(&config.log);

    let grace = config.shutdown.grace();
    let bridge = if dry_run {
        info!("dry run: payloads are logged, nothing is written to redis");
        let connector = Arc::new(config.upstream.connector());
        Bridge::new(config, connector, Arc::new(MemoryQueue::echoing()))
    } else {
        Bridge::from_config(config).context("building bridge")?
    };

    let handle = bridge.start().context("starting bridge")?;
    shutdown_signal().await?;
    info!(grace_ms = grace.as_millis() as u64, "shutdown signal received, stopping");

    let stats = handle.stop(grace).await.context("stopping bridge")?;
    println!(
        "received {}  forwarded {}  filtered {}  publish errors {}  reconnections {}  \
         rejected subscriptions {}",
        stats.received,
        stats.forwarded,
        stats.filtered_out,
        stats.publish_errors,
        stats.reconnections,
        stats.subscriptions_rejected
    );
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("waiting for ctrl-c")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")
}
