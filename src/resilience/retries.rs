//! Retry policy for transformer calls.
//!
//! # Design Decisions
//! - `max_attempts` counts the first call, so 1 means "never retry"
//! - Client errors (4xx) from a transformer are final; repeating the same
//!   body will not change the answer

use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::backoff_delay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Whether another attempt may follow attempt number `attempt`.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        backoff_delay(attempt, self.base_delay, self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}
