//! Retry decisions, linear backoff and the politeness jitter.
//!
//! # Counting convention
//!
//! `attempt_count` is the number of retries already spent, so it is 0 when the
//! first attempt fails. A URL therefore gets at most `max_retries + 1`
//! attempts.
//!
//! [`RetryPolicy::backoff_delay`] takes the ordinal of the *upcoming* retry
//! (`attempt_count + 1`), so the first retry waits one base unit:
//!
//! ```text
//! retry 1: base * 1
//! retry 2: base * 2
//! retry n: base * n
//! ```
//!
//! The jitter is separate from backoff: when enabled it is slept before every
//! attempt, including the first.

use crate::models::FetchOutcome;
use rand::{Rng, rng};
use std::time::Duration;

/// Inclusive bounds for the pre-attempt jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitterRange {
    pub min: Duration,
    pub max: Duration,
}

impl Default for JitterRange {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(100),
            max: Duration::from_millis(690),
        }
    }
}

impl JitterRange {
    /// A uniformly random delay within the bounds.
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rng().random_range(self.min..=self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Unit of linear backoff.
    pub base_backoff: Duration,
    /// Pre-attempt jitter; `None` disables randomized delay.
    pub jitter: Option<JitterRange>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(500),
            jitter: None,
        }
    }
}

impl RetryPolicy {
    /// True iff the outcome failed and retries remain.
    pub fn should_retry(&self, attempt_count: u32, outcome: &FetchOutcome) -> bool {
        outcome.is_err() && attempt_count < self.max_retries
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        self.base_backoff.saturating_mul(retry)
    }

    /// Politeness delay before an attempt, if randomized delay is on.
    pub fn jitter_delay(&self) -> Option<Duration> {
        self.jitter.map(|range| range.sample())
    }
}
