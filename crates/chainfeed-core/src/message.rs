//! Payloads moving through the bridge.

use std::sync::Arc;

/// A fully reassembled upstream message.
///
/// Only produced once the final fragment has arrived; the payload is never
/// inspected beyond substring filtering. Cloning shares the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteMessage {
    text: Arc<str>,
}

impl CompleteMessage {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Leading bytes of the payload for log lines, cut on a char boundary.
    pub fn preview(&self, max: usize) -> &str {
        if self.text.len() <= max {
            return &self.text;
        }
        let mut end = max;
        while !self.text.is_char_boundary(end) {
            end -= 1;
        }
        &self.text[..end]
    }
}

impl From<String> for CompleteMessage {
    fn from(s: String) -> Self {
        Self { text: s.into() }
    }
}

impl From<&str> for CompleteMessage {
    fn from(s: &str) -> Self {
        Self { text: s.into() }
    }
}

impl std::fmt::Display for CompleteMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// A message that passed the filter, addressed to a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedMessage {
    pub payload: CompleteMessage,
    pub queue: String,
}

impl ForwardedMessage {
    pub fn new(payload: CompleteMessage, queue: impl Into<String>) -> Self {
        Self {
            payload,
            queue: queue.into(),
        }
    }
}
