//! Retry ceiling and exponential backoff for classification calls.

use std::time::Duration;

use crate::config::{defaults, ClassifierConfig};

/// Longest shift applied to the base delay; keeps the multiplication sane.
const MAX_BACKOFF_SHIFT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per classification, first try included
    pub max_attempts: u32,
    /// Wait before the first retry; doubles per further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_ATTEMPTS,
            base_delay: Duration::from_millis(defaults::BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
        }
    }

    /// Delay before 1-based `attempt`. `None` for the first attempt.
    ///
    /// Attempt 2 waits `base`, attempt 3 waits `2 * base`, and so on.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt < 2 {
            return None;
        }
        let shift = (attempt - 2).min(MAX_BACKOFF_SHIFT);
        Some(self.base_delay.saturating_mul(1u32 << shift))
    }
}
