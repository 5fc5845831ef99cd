use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ATTEMPTS: u8 = 3;
pub const DEFAULT_BASE_DELAY_MS: u32 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn max_attempts(mut self, max_attempts: u8) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn base_delay_ms(mut self, base_delay_ms: u32) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Fresh state for one provider in the chain.
    pub fn start(&self) -> RetryState {
        RetryState {
            attempt: 1,
            max_attempts: self.max_attempts.max(1),
            base_delay_ms: self.base_delay_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempt: u8,
    max_attempts: u8,
    base_delay_ms: u32,
}

impl RetryState {
    pub fn attempt(&self) -> u8 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u8 {
        self.max_attempts
    }

    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Delay to wait after the current attempt failed.
    pub fn backoff(&self) -> Duration {
        backoff_delay(self.base_delay_ms, self.attempt)
    }

    pub fn advance(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }
}

/// `base_delay_ms * 2^(attempt - 1)`, saturating.
pub fn backoff_delay(base_delay_ms: u32, attempt: u8) -> Duration {
    let shift = u32::from(attempt.saturating_sub(1)).min(63);
    let multiplier = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
    Duration::from_millis(u64::from(base_delay_ms).saturating_mul(multiplier))
}
