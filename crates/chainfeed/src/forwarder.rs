//! Filter-and-publish stage between the supervisor and the queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, enabled, trace, warn, Level};

use chainfeed_core::error::PublishError;
use chainfeed_core::message::{CompleteMessage, ForwardedMessage};
use chainfeed_core::notification::LogsNotification;
use chainfeed_core::watch::WatchSet;
use chainfeed_observability::BridgeMetrics;
use chainfeed_queue::QueuePublisher;
use chainfeed_ws::MessageHandler;

/// Forwards every message that passes the watch-set filter.
///
/// A failed publish is logged and counted and the message is dropped.
pub struct Forwarder {
    watch: WatchSet,
    publisher: Arc<dyn QueuePublisher>,
    queue: String,
    timeout: Duration,
    metrics: Arc<BridgeMetrics>,
}

impl Forwarder {
    pub fn new(
        watch: WatchSet,
        publisher: Arc<dyn QueuePublisher>,
        queue: impl Into<String>,
        timeout: Duration,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            watch,
            publisher,
            queue: queue.into(),
            timeout,
            metrics,
        }
    }

    pub fn watch(&self) -> &WatchSet {
        &self.watch
    }

    async fn publish(&self, message: &ForwardedMessage) -> Result<(), PublishError> {
        match tokio::time::timeout(self.timeout, self.publisher.publish(message)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout {
                queue: message.queue.clone(),
                ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl MessageHandler for Forwarder {
    async fn handle(&self, message: CompleteMessage) {
        if !self.watch.should_forward(&message) {
            self.metrics.record_filtered();
            trace!(bytes = message.len(), "no watched identifier, dropped");
            return;
        }

        if enabled!(Level::DEBUG) {
            if let Some(n) = LogsNotification::parse(message.as_str()) {
                debug!(
                    signature = n.signature(),
                    slot = ?n.slot(),
                    failed = n.params.result.value.err.is_failed(),
                    "forwarding transaction"
                );
            }
        }

        let forwarded = ForwardedMessage::new(message, self.queue.as_str());
        match self.publish(&forwarded).await {
            Ok(()) => self.metrics.record_forwarded(),
            Err(e) => {
                self.metrics.record_publish_error();
                warn!(
                    queue = %self.queue,
                    backend = self.publisher.target(),
                    bytes = forwarded.payload.len(),
                    error = %e,
                    "publish failed, message dropped"
                );
            }
        }
    }
}
