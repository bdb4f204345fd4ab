//! In-memory queue backend.
//!
//! Keeps every queue as a FIFO in RAM for tests. The echoing variant behind
//! `chainfeed run --dry-run` logs each payload and keeps nothing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::info;

use chainfeed_core::error::PublishError;
use chainfeed_core::message::ForwardedMessage;

use crate::publisher::QueuePublisher;

#[derive(Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    /// Number of upcoming publishes to reject.
    fail_next: AtomicUsize,
    echo: bool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log every accepted payload at info level without storing it.
    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    /// Reject the next `n` publishes with [`PublishError::Command`].
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Payloads currently in `queue`, oldest first.
    pub fn messages(&self, queue: &str) -> Vec<String> {
        self.lock()
            .get(queue)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, queue: &str) -> usize {
        self.lock().get(queue).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<String>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl QueuePublisher for MemoryQueue {
    async fn publish(&self, message: &ForwardedMessage) -> Result<(), PublishError> {
        if self.take_failure() {
            return Err(PublishError::Command {
                queue: message.queue.clone(),
                reason: "injected failure".into(),
            });
        }
        if self.echo {
            info!(
                queue = %message.queue,
                bytes = message.payload.len(),
                payload = %message.payload.preview(256),
                "dry-run publish"
            );
            return Ok(());
        }
        self.lock()
            .entry(message.queue.clone())
            .or_default()
            .push_back(message.payload.to_string());
        Ok(())
    }

    fn target(&self) -> &str {
        "memory"
    }
}
