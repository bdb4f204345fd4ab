//! Capped exponential backoff between reconnect attempts.

use std::time::Duration;

/// Configuration for the reconnect backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt.
    pub initial: Duration,
    /// Upper bound on any single delay.
    pub max: Duration,
    /// Multiplier applied per consecutive failed attempt (1.0 = fixed delay).
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

/// Stateless backoff policy: computes the delay for a given attempt number.
///
/// Unlike a request retry policy there is no attempt limit: the supervisor
/// reconnects until it is cancelled.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub config: BackoffConfig,
}

impl BackoffPolicy {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// Constant delay between attempts.
    pub fn fixed(delay: Duration) -> Self {
        Self::new(BackoffConfig {
            initial: delay,
            max: delay,
            multiplier: 1.0,
        })
    }

    /// Returns the delay before the `attempt`-th reconnect (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(64) as i32;
        let base_ms = self.config.initial.as_millis() as f64 * self.config.multiplier.powi(exp);
        let cap_ms = self.config.max.as_millis() as f64;
        Duration::from_millis(base_ms.min(cap_ms) as u64)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_from_initial() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
    }

    #[test]
    fn capped_at_max() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(7), Duration::from_secs(60));
        assert_eq!(policy.delay(500), Duration::from_secs(60));
    }

    #[test]
    fn fixed_delay_never_grows() {
        let policy = BackoffPolicy::fixed(Duration::from_secs(5));
        for attempt in 1..10 {
            assert_eq!(policy.delay(attempt), Duration::from_secs(5));
        }
    }

    #[test]
    fn attempt_zero_uses_initial() {
        let policy = BackoffPolicy::new(BackoffConfig {
            initial: Duration::from_millis(250),
            max: Duration::from_secs(1),
            multiplier: 3.0,
        });
        assert_eq!(policy.delay(0), Duration::from_millis(250));
        assert_eq!(policy.delay(2), Duration::from_millis(750));
        assert_eq!(policy.delay(3), Duration::from_secs(1));
    }
}
