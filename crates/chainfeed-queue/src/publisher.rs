//! The publishing seam between the bridge and a queue backend.

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use chainfeed_core::error::PublishError;
use chainfeed_core::message::ForwardedMessage;

/// Appends forwarded messages to a named queue.
///
/// One call is one attempt. Callers decide what a failure means; the bridge
/// logs it and drops the message.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    async fn publish(&self, message: &ForwardedMessage) -> Result<(), PublishError>;

    /// Human-readable backend identity for log lines.
    fn target(&self) -> &str;
}

/// Which end of the list new messages are pushed onto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushSide {
    /// `RPUSH`: consumers pop from the head for FIFO order.
    #[default]
    Right,
    /// `LPUSH`: consumers pop from the tail for FIFO order.
    Left,
}

impl PushSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Right => "right",
            Self::Left => "left",
        }
    }
}

impl std::fmt::Display for PushSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PushSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "right" | "rpush" | "tail" => Ok(Self::Right),
            "left" | "lpush" | "head" => Ok(Self::Left),
            other => Err(format!("unknown push side '{other}' (expected right or left)")),
        }
    }
}
