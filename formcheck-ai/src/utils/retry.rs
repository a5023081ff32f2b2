//! Poll retry policy
//!
//! Bounded retries for transient analyzer errors during polling.
//!
//! **Backoff strategy:**
//! - First retry waits `base` (the poll interval)
//! - Each further consecutive failure doubles the wait
//! - Waits never exceed `max_backoff`
//! - `max_retries` consecutive failures exhaust the policy

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated before giving up
    pub max_retries: u32,
    pub base: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            base,
            max_backoff,
        }
    }

    /// Wait before the next attempt after `failures` consecutive failures
    ///
    /// `None` once the bound is reached.
    pub fn backoff(&self, failures: u32) -> Option<Duration> {
        if failures == 0 {
            return Some(self.base);
        }
        if failures >= self.max_retries {
            return None;
        }

        let factor = 2u32.saturating_pow(failures - 1);
        let delay = self.base.checked_mul(factor).unwrap_or(self.max_backoff);
        Some(delay.min(self.max_backoff.max(self.base)))
    }
}
