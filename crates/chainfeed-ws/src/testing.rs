//! Scripted in-memory transport for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use chainfeed_core::error::StreamError;

use crate::transport::{Connector, Frame, FrameSink, FrameSource, Transport};

/// Behaviour of one scripted connection.
#[derive(Debug, Clone, Default)]
pub(crate) struct Script {
    connect_error: bool,
    fail_send_at: Option<usize>,
    frames: Vec<Frame>,
    end_with_error: bool,
    hold_open: bool,
}

impl Script {
    pub fn frames(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            ..Default::default()
        }
    }

    pub fn connect_error() -> Self {
        Self {
            connect_error: true,
            ..Default::default()
        }
    }

    /// Fail the `index`-th text send (0-based).
    pub fn fail_send_at(mut self, index: usize) -> Self {
        self.fail_send_at = Some(index);
        self
    }

    /// Yield a read error once the frames are exhausted.
    pub fn then_error(mut self) -> Self {
        self.end_with_error = true;
        self
    }

    /// Never end once the frames are exhausted.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

#[derive(Debug, Default)]
struct Wire {
    sent: Vec<String>,
    pongs: Vec<Vec<u8>>,
    closed: bool,
}

/// Hands out scripted transports in order; connect fails once they run out.
pub(crate) struct MockConnector {
    scripts: Mutex<VecDeque<Script>>,
    wires: Arc<Mutex<Vec<Arc<Mutex<Wire>>>>>,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            wires: Arc::default(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Connect attempts, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Established connections.
    pub fn connections(&self) -> usize {
        self.wires.lock().unwrap().len()
    }

    fn wire(&self, conn: usize) -> Arc<Mutex<Wire>> {
        Arc::clone(&self.wires.lock().unwrap()[conn])
    }

    /// Text frames sent on the `conn`-th established connection.
    pub fn sent(&self, conn: usize) -> Vec<String> {
        self.wire(conn).lock().unwrap().sent.clone()
    }

    pub fn pongs(&self, conn: usize) -> Vec<Vec<u8>> {
        self.wire(conn).lock().unwrap().pongs.clone()
    }

    pub fn closed(&self, conn: usize) -> bool {
        self.wire(conn).lock().unwrap().closed
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Transport, StreamError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();
        let script = match script {
            Some(s) if !s.connect_error => s,
            _ => {
                return Err(StreamError::Connect {
                    url: url.to_string(),
                    reason: "connection refused".into(),
                })
            }
        };

        let wire = Arc::new(Mutex::new(Wire::default()));
        self.wires.lock().unwrap().push(Arc::clone(&wire));

        Ok(Transport {
            sink: Box::new(MockSink {
                wire,
                fail_send_at: script.fail_send_at,
                sends: 0,
            }),
            source: Box::new(MockSource {
                frames: script.frames.into(),
                end_with_error: script.end_with_error,
                hold_open: script.hold_open,
            }),
        })
    }
}

struct MockSink {
    wire: Arc<Mutex<Wire>>,
    fail_send_at: Option<usize>,
    sends: usize,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<(), StreamError> {
        let index = self.sends;
        self.sends += 1;
        if self.fail_send_at == Some(index) {
            return Err(StreamError::Send("broken pipe".into()));
        }
        self.wire.lock().unwrap().sent.push(text);
        Ok(())
    }

    async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), StreamError> {
        self.wire.lock().unwrap().pongs.push(payload);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.wire.lock().unwrap().closed = true;
        Ok(())
    }
}

struct MockSource {
    frames: VecDeque<Frame>,
    end_with_error: bool,
    hold_open: bool,
}

#[async_trait]
impl FrameSource for MockSource {
    async fn next_frame(&mut self) -> Option<Result<Frame, StreamError>> {
        if let Some(frame) = self.frames.pop_front() {
            return Some(Ok(frame));
        }
        if self.end_with_error {
            self.end_with_error = false;
            return Some(Err(StreamError::Receive("connection reset".into())));
        }
        if self.hold_open {
            futures::future::pending::<()>().await;
        }
        None
    }
}
