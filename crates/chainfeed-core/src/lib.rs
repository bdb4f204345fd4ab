//! chainfeed-core: foundation types for ChainFeed.
//!
//! # Overview
//!
//! ChainFeed bridges a Solana `logsSubscribe` WebSocket stream into a durable
//! Redis work queue. The core crate defines:
//!
//! - [`SubscriptionRequest`] / [`SubscriptionPlan`]: upstream wire types
//! - [`WatchSet`]: watched identifiers and the forward-or-drop predicate
//! - [`CompleteMessage`] / [`ForwardedMessage`]: the payloads moving through the bridge
//! - [`ConnectionState`]: lifecycle of a single upstream connection
//! - [`StreamError`], [`PublishError`], [`ConfigError`]: structured error types
//! - [`policy`] module: reconnect backoff
//! - [`notification`] module: typed views of upstream notifications

pub mod error;
pub mod message;
pub mod notification;
pub mod policy;
pub mod request;
pub mod state;
pub mod watch;

pub use error::{ConfigError, PublishError, StreamError};
pub use message::{CompleteMessage, ForwardedMessage};
pub use policy::{BackoffConfig, BackoffPolicy};
pub use request::{Commitment, LogsFilter, SubscriptionPlan, SubscriptionRequest};
pub use state::ConnectionState;
pub use watch::WatchSet;
