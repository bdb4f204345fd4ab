//! Upstream connection lifecycle.

/// State of a single subscription connection.
///
/// ```text
/// Disconnected → Connecting → Subscribing → Streaming → Closing → Disconnected
///                    │             │
///                    └──── Faulted ┘
/// ```
///
/// `Faulted` is terminal for a connection instance; recovery means building a
/// new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribing,
    Streaming,
    Closing,
    Faulted,
}

impl ConnectionState {
    /// Returns `true` once the instance can no longer be used.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Faulted)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Subscribing => write!(f, "subscribing"),
            Self::Streaming => write!(f, "streaming"),
            Self::Closing => write!(f, "closing"),
            Self::Faulted => write!(f, "faulted"),
        }
    }
}
