//! Transport seam between the subscription connection and the wire.
//!
//! [`WsConnector`] is the production implementation backed by
//! `tokio-tungstenite`. Any other [`Connector`] can drive the same
//! connection and supervisor logic.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::{CapacityError, Error as WsError};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};

use chainfeed_core::error::StreamError;

use crate::reassembler::DEFAULT_MAX_MESSAGE_BYTES;

/// One unit read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Message data; `fin` marks the last fragment of a logical message.
    Data { bytes: Bytes, fin: bool },
    /// Keep-alive probe that must be answered with a pong.
    Ping(Vec<u8>),
    /// Protocol-level close from the remote end.
    Close,
}

/// Write half of a transport.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), StreamError>;

    async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), StreamError>;

    /// Send a close frame and flush.
    async fn close(&mut self) -> Result<(), StreamError>;
}

/// Read half of a transport.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the transport has ended.
    async fn next_frame(&mut self) -> Option<Result<Frame, StreamError>>;
}

/// An established transport, split into its two halves.
pub struct Transport {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

/// Establishes transports to an upstream URL.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Transport, StreamError>;
}

// ─── tokio-tungstenite implementation ────────────────────────────────────────

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connector.
///
/// Continuation frames are coalesced by tungstenite, so every data frame this
/// connector yields is final. The same byte cap is applied at the protocol
/// layer so oversized messages are rejected before they are buffered.
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
    max_message_bytes: usize,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration, max_message_bytes: usize) -> Self {
        Self {
            connect_timeout,
            max_message_bytes,
        }
    }

    fn ws_config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(self.max_message_bytes);
        config.max_frame_size = Some(self.max_message_bytes);
        config
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), DEFAULT_MAX_MESSAGE_BYTES)
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Transport, StreamError> {
        let connect = connect_async_with_config(url, Some(self.ws_config()), false);
        let (ws, _response) = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| StreamError::Connect {
                url: url.to_string(),
                reason: format!("timed out after {}ms", self.connect_timeout.as_millis()),
            })?
            .map_err(|e| StreamError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let (sink, stream) = ws.split();
        Ok(Transport {
            sink: Box::new(WsSink(sink)),
            source: Box::new(WsSource(stream)),
        })
    }
}

struct WsSink(SplitSink<WsStream, Message>);

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), StreamError> {
        self.0
            .send(Message::Text(text))
            .await
            .map_err(|e| StreamError::Send(e.to_string()))
    }

    async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), StreamError> {
        self.0
            .send(Message::Pong(payload))
            .await
            .map_err(|e| StreamError::Send(format!("pong: {e}")))
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        match self.0.close().await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(StreamError::Send(format!("close: {e}"))),
        }
    }
}

struct WsSource(SplitStream<WsStream>);

#[async_trait]
impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Option<Result<Frame, StreamError>> {
        loop {
            let frame = match self.0.next().await? {
                Ok(Message::Text(text)) => Frame::Data {
                    bytes: Bytes::from(text.into_bytes()),
                    fin: true,
                },
                Ok(Message::Binary(data)) => Frame::Data {
                    bytes: Bytes::from(data),
                    fin: true,
                },
                Ok(Message::Ping(payload)) => Frame::Ping(payload),
                Ok(Message::Close(_)) => Frame::Close,
                Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => return None,
                Err(WsError::Capacity(CapacityError::MessageTooLong { size, max_size })) => {
                    return Some(Err(StreamError::MessageTooLarge {
                        size,
                        limit: max_size,
                    }))
                }
                Err(e) => return Some(Err(StreamError::Receive(e.to_string()))),
            };
            return Some(Ok(frame));
        }
    }
}
