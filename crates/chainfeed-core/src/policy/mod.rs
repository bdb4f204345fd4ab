//! Reconnect policy for the upstream supervisor.

pub mod backoff;

pub use backoff::{BackoffConfig, BackoffPolicy};
