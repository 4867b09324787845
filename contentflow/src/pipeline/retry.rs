//! Fixed-delay retry policy for the full-pipeline composite.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How many times a run is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    /// Wait before each retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(60))
    }
}

impl RetryPolicy {
    /// A policy with `max_attempts` runs spaced `delay` apart.
    #[must_use]
    pub const fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A policy that runs once.
    #[must_use]
    pub const fn once() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Decides what follows the failure of attempt number `attempt` (1-based).
    #[must_use]
    pub fn decide(&self, attempt: usize, retryable: bool) -> RetryDecision {
        if !retryable {
            RetryDecision::NotRetryable
        } else if attempt < self.max_attempts {
            RetryDecision::Retry(self.delay)
        } else {
            RetryDecision::GiveUp
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run again after the delay.
    Retry(Duration),
    /// No attempts left.
    GiveUp,
    /// The error will not go away by retrying.
    NotRetryable,
}
