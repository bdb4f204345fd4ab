//! Errors surfaced by the bridge.

use thiserror::Error;

use chainfeed_core::error::{ConfigError, PublishError};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("queue setup failed: {0}")]
    Publisher(#[from] PublishError),

    /// The bridge task panicked or was aborted.
    #[error("bridge task failed: {0}")]
    Task(String),
}
