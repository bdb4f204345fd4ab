//! chainfeed-ws: resilient `logsSubscribe` WebSocket stream.
//!
//! # Features
//! - Frame reassembly with a per-message size cap
//! - One connection multiplexing any number of subscriptions
//! - Serialized sends (subscribe requests, pongs) alongside a single reader
//! - Reconnect supervisor with capped exponential backoff that replays the
//!   full subscription plan on every new connection
//! - Cancellation honored at every suspension point

pub mod connection;
pub mod reassembler;
pub mod supervisor;
pub mod transport;

#[cfg(test)]
mod testing;

pub use connection::{CloseReason, ConnectionLimits, Received, SubscriptionConnection};
pub use reassembler::Reassembler;
pub use supervisor::{MessageHandler, ReconnectSupervisor};
pub use transport::{Connector, Frame, FrameSink, FrameSource, Transport, WsConnector};
