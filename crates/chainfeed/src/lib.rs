//! chainfeed: resilient Solana `logsSubscribe` to Redis queue bridge.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use chainfeed::{Bridge, BridgeConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::load(None)?;
//! let grace = config.shutdown.grace();
//! let handle = Bridge::from_config(config)?.start()?;
//!
//! tokio::signal::ctrl_c().await?;
//! let stats = handle.stop(grace).await?;
//! println!("forwarded {} messages", stats.forwarded);
//! # Ok(())
//! # }
//! ```
//!
//! The pieces used above live in their own crates and are re-exported here:
//! [`chainfeed_ws`] for the upstream stream, [`chainfeed_queue`] for the
//! publishers and [`chainfeed_core`] for the shared types.

pub mod bridge;
pub mod config;
pub mod error;
pub mod forwarder;

pub use bridge::{resolve_watch_set, Bridge, BridgeHandle, ReloadFn};
pub use config::{
    BridgeConfig, OnEmpty, QueueConfig, ReconnectConfig, ShutdownConfig, UpstreamConfig,
    WatchConfig,
};
pub use error::BridgeError;
pub use forwarder::Forwarder;

pub use chainfeed_core::{
    Commitment, CompleteMessage, ConfigError, ForwardedMessage, PublishError, StreamError,
    SubscriptionPlan, SubscriptionRequest, WatchSet,
};
pub use chainfeed_observability::{init_tracing, BridgeStats, LogConfig};
pub use chainfeed_queue::{MemoryQueue, PushSide, QueuePublisher, RedisQueuePublisher};
pub use chainfeed_ws::{Connector, WsConnector};

pub use chainfeed_core;
pub use chainfeed_queue;
pub use chainfeed_ws;
