//! Connect retry policy.
//!
//! Flat backoff: every gap between attempts is the same length.

use std::time::Duration;

/// Default number of connect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default bound on a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default gap between attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Bounded retry-with-timeout policy for outbound connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Bound on each connect attempt.
    pub connect_timeout: Duration,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Effective number of attempts (at least one).
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt `attempt` (1-based), or `None`
    /// when no attempts remain.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.attempts() {
            None
        } else {
            Some(self.backoff)
        }
    }

    /// Longest time the whole retry loop can spend connecting and waiting.
    pub fn worst_case(&self) -> Duration {
        let attempts = self.attempts();
        self.connect_timeout * attempts + self.backoff * (attempts - 1)
    }
}
