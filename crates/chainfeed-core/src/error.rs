//! Error types for the ChainFeed pipeline.

use thiserror::Error;

use crate::state::ConnectionState;

/// Errors raised on the upstream side of the bridge.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Transport could not be established.
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    /// A subscription request could not be sent.
    #[error("subscription request {id} failed: {reason}")]
    Subscribe { id: u64, reason: String },

    /// Write error on an established connection.
    #[error("send error: {0}")]
    Send(String),

    /// Read error on an established connection.
    #[error("receive error: {0}")]
    Receive(String),

    /// A single logical message grew past the configured cap.
    #[error("message of {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },

    /// A completed message was not valid UTF-8 text.
    #[error("message is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Operation requires a state the connection is not in.
    #[error("connection is {state}, expected {expected}")]
    InvalidState {
        state: ConnectionState,
        expected: ConnectionState,
    },

    /// Operation attempted on a connection with no transport.
    #[error("not connected")]
    NotConnected,

    /// The cancellation signal fired while the operation was pending.
    #[error("cancelled")]
    Cancelled,

    #[error("timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StreamError {
    /// Returns `true` if tearing down and reconnecting can recover.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidState { .. } | Self::NotConnected | Self::Cancelled
        )
    }
}

/// Errors raised by a queue publisher.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("queue backend connect failed: {0}")]
    Connect(String),

    #[error("queue command failed on '{queue}': {reason}")]
    Command { queue: String, reason: String },

    #[error("publish to '{queue}' timed out after {ms}ms")]
    Timeout { queue: String, ms: u64 },

    #[error("publisher closed")]
    Closed,
}

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("watch set is empty and watch.on_empty is fail_fast")]
    EmptyWatchSet,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
