//! Keeps a subscription plan alive across transport failures.
//!
//! Each session builds a fresh [`SubscriptionConnection`], opens it, replays
//! the full plan and streams messages into a [`MessageHandler`] until the
//! connection ends. The supervisor then closes it, waits out the backoff
//! delay and starts over, until the cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use chainfeed_core::error::StreamError;
use chainfeed_core::message::CompleteMessage;
use chainfeed_core::policy::BackoffPolicy;
use chainfeed_core::request::SubscriptionPlan;
use chainfeed_observability::BridgeMetrics;

use crate::connection::{CloseReason, ConnectionLimits, Received, SubscriptionConnection};
use crate::transport::Connector;

/// Receives every complete message, in wire order.
///
/// Implementations handle their own failures; the supervisor awaits each
/// call before reading the next message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: CompleteMessage);
}

enum SessionEnd {
    Cancelled,
    Closed(CloseReason),
    Failed {
        phase: &'static str,
        error: StreamError,
    },
}

struct SessionOutcome {
    /// Whether the session got as far as `Streaming`.
    streamed: bool,
    end: SessionEnd,
}

/// Reconnecting driver for one upstream URL.
pub struct ReconnectSupervisor {
    url: String,
    connector: Arc<dyn Connector>,
    plan: SubscriptionPlan,
    backoff: BackoffPolicy,
    limits: ConnectionLimits,
    metrics: Arc<BridgeMetrics>,
}

impl ReconnectSupervisor {
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        plan: SubscriptionPlan,
    ) -> Self {
        Self {
            url: url.into(),
            connector,
            plan,
            backoff: BackoffPolicy::default(),
            limits: ConnectionLimits::default(),
            metrics: Arc::new(BridgeMetrics::new()),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_limits(mut self, limits: ConnectionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<BridgeMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run sessions until `cancel` fires.
    pub async fn run(&self, handler: &dyn MessageHandler, cancel: CancellationToken) {
        let mut attempt = 0u32;

        info!(url = %self.url, subscriptions = self.plan.len(), "supervisor starting");

        while !cancel.is_cancelled() {
            let mut conn = SubscriptionConnection::new(self.url.clone(), self.limits.clone())
                .with_metrics(Arc::clone(&self.metrics));
            let outcome = self.run_session(&mut conn, handler, &cancel).await;
            conn.close().await;

            match outcome.end {
                SessionEnd::Cancelled => break,
                SessionEnd::Closed(reason) => {
                    info!(url = %self.url, %reason, "upstream session ended");
                }
                SessionEnd::Failed { phase, error: e } if e.is_retryable() => {
                    warn!(url = %self.url, phase, error = %e, "upstream session failed");
                }
                SessionEnd::Failed { phase, error: e } => {
                    error!(url = %self.url, phase, error = %e, "upstream session failed");
                }
            }

            if cancel.is_cancelled() {
                break;
            }

            self.metrics.record_reconnection();
            attempt = if outcome.streamed { 1 } else { attempt.saturating_add(1) };
            let delay = self.backoff.delay(attempt);
            info!(
                url = %self.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "reconnecting"
            );

            if !sleep_or_cancel(delay, &cancel).await {
                break;
            }
        }

        info!(url = %self.url, "supervisor stopped");
    }

    async fn run_session(
        &self,
        conn: &mut SubscriptionConnection,
        handler: &dyn MessageHandler,
        cancel: &CancellationToken,
    ) -> SessionOutcome {
        if let Err(e) = conn.open(self.connector.as_ref(), cancel).await {
            return failed("connect", e, false);
        }
        if let Err(e) = conn.subscribe(&self.plan).await {
            return failed("subscribe", e, false);
        }

        loop {
            match conn.recv(cancel).await {
                Ok(Received::Message(message)) => {
                    self.metrics.record_received();
                    handler.handle(message).await;
                }
                Ok(Received::Closed(CloseReason::Cancelled)) => {
                    return SessionOutcome {
                        streamed: true,
                        end: SessionEnd::Cancelled,
                    }
                }
                Ok(Received::Closed(reason)) => {
                    return SessionOutcome {
                        streamed: true,
                        end: SessionEnd::Closed(reason),
                    }
                }
                Err(e) => return failed("receive", e, true),
            }
        }
    }
}

fn failed(phase: &'static str, error: StreamError, streamed: bool) -> SessionOutcome {
    let end = match error {
        StreamError::Cancelled => SessionEnd::Cancelled,
        error => SessionEnd::Failed { phase, error },
    };
    SessionOutcome { streamed, end }
}

/// Returns `false` if cancelled before `delay` elapsed.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
