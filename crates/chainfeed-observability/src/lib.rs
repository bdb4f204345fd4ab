//! # chainfeed-observability
//!
//! Logging and counters for the ChainFeed bridge.
//!
//! ## Counters
//! - `received`: complete messages read from upstream
//! - `forwarded`: messages pushed to the queue
//! - `filtered_out`: messages dropped by the watch-set filter
//! - `publish_errors`: messages dropped because the queue call failed
//! - `reconnections`: upstream sessions that ended and were restarted
//!
//! ## Structured logging
//! Text or JSON logs; level configurable globally and per component.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::{BridgeMetrics, BridgeStats};
pub use tracing_setup::{init_tracing, LogConfig};
