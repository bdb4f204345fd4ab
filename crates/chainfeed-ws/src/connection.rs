//! A single upstream connection and its subscription set.
//!
//! One [`SubscriptionConnection`] models the lifetime of one transport. It is
//! never repaired: once it faults or closes, the supervisor drops it and
//! builds a new one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chainfeed_core::error::StreamError;
use chainfeed_core::message::CompleteMessage;
use chainfeed_core::notification::SubscriptionReply;
use chainfeed_core::request::{SubscriptionPlan, SubscriptionRequest};
use chainfeed_core::state::ConnectionState;
use chainfeed_observability::BridgeMetrics;

use crate::reassembler::{Reassembler, DEFAULT_MAX_MESSAGE_BYTES};
use crate::transport::{Connector, Frame, FrameSink, FrameSource};

type SharedSink = Arc<Mutex<Box<dyn FrameSink>>>;

/// Per-connection resource limits.
#[derive(Debug, Clone)]
pub struct ConnectionLimits {
    /// Cap on a single reassembled message.
    pub max_message_bytes: usize,
    /// How long `close()` waits for the close handshake.
    pub close_timeout: Duration,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            close_timeout: Duration::from_secs(2),
        }
    }
}

/// Why the receive sequence ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The remote sent a close frame.
    Remote,
    /// The transport ended without a close frame.
    EndOfStream,
    /// The cancellation token fired.
    Cancelled,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote => write!(f, "closed by remote"),
            Self::EndOfStream => write!(f, "end of stream"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One item of the receive sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Message(CompleteMessage),
    Closed(CloseReason),
}

/// Owns one transport connection to the upstream node.
pub struct SubscriptionConnection {
    url: String,
    state: ConnectionState,
    sink: Option<SharedSink>,
    source: Option<Box<dyn FrameSource>>,
    reassembler: Reassembler,
    limits: ConnectionLimits,
    next_id: u64,
    metrics: Arc<BridgeMetrics>,
}

impl SubscriptionConnection {
    pub fn new(url: impl Into<String>, limits: ConnectionLimits) -> Self {
        Self {
            url: url.into(),
            state: ConnectionState::Disconnected,
            sink: None,
            source: None,
            reassembler: Reassembler::new(limits.max_message_bytes),
            limits,
            next_id: 1,
            metrics: Arc::new(BridgeMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<BridgeMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn expect_state(&self, expected: ConnectionState) -> Result<(), StreamError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(StreamError::InvalidState {
                state: self.state,
                expected,
            })
        }
    }

    /// Establish the transport.
    ///
    /// Moves to `Subscribing` on success and `Faulted` on failure.
    pub async fn open(
        &mut self,
        connector: &dyn Connector,
        cancel: &CancellationToken,
    ) -> Result<(), StreamError> {
        self.expect_state(ConnectionState::Disconnected)?;
        self.state = ConnectionState::Connecting;
        debug!(url = %self.url, "connecting");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StreamError::Cancelled),
            res = connector.connect(&self.url) => res,
        };

        match result {
            Ok(transport) => {
                self.sink = Some(Arc::new(Mutex::new(transport.sink)));
                self.source = Some(transport.source);
                self.state = ConnectionState::Subscribing;
                info!(url = %self.url, "connected");
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Faulted;
                Err(e)
            }
        }
    }

    /// Send every request in `plan`, in order, one at a time.
    ///
    /// Ids continue from the last request sent on this connection, starting
    /// at 1. The first failed send faults the connection and aborts the rest:
    /// a half-subscribed connection is never streamed from.
    pub async fn subscribe(
        &mut self,
        plan: &SubscriptionPlan,
    ) -> Result<Vec<SubscriptionRequest>, StreamError> {
        self.expect_state(ConnectionState::Subscribing)?;
        let sink = self.sink.clone().ok_or(StreamError::NotConnected)?;

        let requests = plan.requests(self.next_id);
        self.next_id += requests.len() as u64;

        for req in &requests {
            let sent = match req.to_json() {
                Ok(text) => sink.lock().await.send_text(text).await,
                Err(e) => Err(StreamError::Serialization(e)),
            };
            if let Err(e) = sent {
                self.state = ConnectionState::Faulted;
                return Err(StreamError::Subscribe {
                    id: req.id,
                    reason: e.to_string(),
                });
            }
            debug!(url = %self.url, id = req.id, filter = %req.params[0], "subscription sent");
        }

        self.state = ConnectionState::Streaming;
        info!(url = %self.url, subscriptions = requests.len(), "streaming");
        Ok(requests)
    }

    /// Read until the next complete message or the end of the stream.
    ///
    /// Repeated calls form the receive sequence. It ends with
    /// `Ok(Received::Closed(_))` or with an `Err`; both move the connection
    /// to `Closing`. A partial message is discarded on any error.
    pub async fn recv(&mut self, cancel: &CancellationToken) -> Result<Received, StreamError> {
        self.expect_state(ConnectionState::Streaming)?;

        loop {
            let source = self.source.as_mut().ok_or(StreamError::NotConnected)?;
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.state = ConnectionState::Closing;
                    return Ok(Received::Closed(CloseReason::Cancelled));
                }
                next = source.next_frame() => next,
            };

            match next {
                None => return Ok(self.closed(CloseReason::EndOfStream)),
                Some(Ok(Frame::Close)) => return Ok(self.closed(CloseReason::Remote)),
                Some(Ok(Frame::Ping(payload))) => {
                    if let Err(e) = send_pong(self.sink.clone(), payload).await {
                        return Err(self.failed(e));
                    }
                }
                Some(Ok(Frame::Data { bytes, fin })) => match self.reassembler.push(&bytes, fin) {
                    Ok(Some(message)) => {
                        self.inspect_reply(&message);
                        return Ok(Received::Message(message));
                    }
                    Ok(None) => {}
                    Err(e) => return Err(self.failed(e)),
                },
                Some(Err(e)) => return Err(self.failed(e)),
            }
        }
    }

    /// Log subscription replies and count rejections.
    ///
    /// A rejected request leaves the rest of the plan streaming. Replaying
    /// the same plan on a new connection would be rejected again.
    fn inspect_reply(&self, message: &CompleteMessage) {
        match SubscriptionReply::parse(message.as_str()) {
            Some(SubscriptionReply::Confirmed { id, subscription }) => {
                info!(url = %self.url, id, subscription, "subscription confirmed");
            }
            Some(SubscriptionReply::Rejected { id, code, message }) => {
                self.metrics.record_subscription_rejected();
                warn!(url = %self.url, id, code, %message, "subscription rejected");
            }
            None => {}
        }
    }

    fn closed(&mut self, reason: CloseReason) -> Received {
        self.state = ConnectionState::Closing;
        Received::Closed(reason)
    }

    fn failed(&mut self, error: StreamError) -> StreamError {
        self.reassembler.reset();
        self.state = ConnectionState::Closing;
        error
    }

    /// Release the transport.
    ///
    /// Sends a close frame if the write half is still usable, waiting at most
    /// `close_timeout`, then drops both halves unconditionally.
    pub async fn close(&mut self) {
        if self.state != ConnectionState::Faulted {
            self.state = ConnectionState::Closing;
        }

        if let Some(sink) = self.sink.take() {
            let graceful = async {
                let mut sink = sink.lock().await;
                sink.close().await
            };
            match tokio::time::timeout(self.limits.close_timeout, graceful).await {
                Ok(Ok(())) => debug!(url = %self.url, "close frame sent"),
                Ok(Err(e)) => debug!(url = %self.url, error = %e, "close frame not sent"),
                Err(_) => warn!(
                    url = %self.url,
                    timeout_ms = self.limits.close_timeout.as_millis() as u64,
                    "close handshake timed out"
                ),
            }
        }
        self.source = None;
        self.reassembler.reset();

        if self.state != ConnectionState::Faulted {
            self.state = ConnectionState::Disconnected;
        }
    }
}

// Takes the sink by value so the future never borrows the connection.
async fn send_pong(sink: Option<SharedSink>, payload: Vec<u8>) -> Result<(), StreamError> {
    let sink = sink.ok_or(StreamError::NotConnected)?;
    let mut sink = sink.lock().await;
    sink.send_pong(payload).await
}
