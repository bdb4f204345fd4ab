//! `chainfeed check` and `chainfeed requests`: offline views of a configuration.

use std::path::Path;

use anyhow::{bail, Context, Result};

use chainfeed::{
    BridgeConfig, ConfigError, OnEmpty, QueuePublisher, RedisQueuePublisher, SubscriptionPlan,
};

fn load(config_path: Option<&Path>) -> Result<BridgeConfig> {
    BridgeConfig::load(config_path).context("loading configuration")
}

pub fn check(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let watch = config.watch.watch_set();
    if watch.is_empty() && config.watch.on_empty == OnEmpty::FailFast {
        bail!(ConfigError::EmptyWatchSet);
    }
    let publisher = RedisQueuePublisher::new(config.queue.redis()).context("queue.url")?;

    println!("Configuration OK");
    if let Some(source) = &config.source {
        println!("  source       : {}", source.display());
    }
    println!("  upstream     : {}", config.upstream.url);
    println!("  commitment   : {}", config.upstream.commitment);
    println!(
        "  watch        : {} ({} identifiers, on_empty = {})",
        watch,
        watch.len(),
        config.watch.on_empty
    );
    println!(
        "  queue        : {} on {} (push {})",
        config.queue.name,
        publisher.target(),
        config.queue.push
    );
    println!(
        "  reconnect    : {}ms → {}ms (x{})",
        config.reconnect.initial_backoff_ms,
        config.reconnect.max_backoff_ms,
        config.reconnect.multiplier
    );
    println!("  max message  : {} bytes", config.upstream.max_message_bytes);
    Ok(())
}

pub fn requests(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let watch = config.watch.watch_set();
    if watch.is_empty() {
        match config.watch.on_empty {
            OnEmpty::FailFast => bail!(ConfigError::EmptyWatchSet),
            OnEmpty::Wait => {
                eprintln!(
                    "watch set is empty; the bridge would wait for identifiers before subscribing"
                );
                return Ok(());
            }
            OnEmpty::PassThrough => {}
        }
    }

    let plan = SubscriptionPlan::for_watch_set(&watch, config.upstream.commitment);
    for request in plan.requests(1) {
        println!("{}", request.to_json()?);
    }
    Ok(())
}
