//! Bounded retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use chronicle_core::error::DomainError;
use rand::Rng;
use tracing::warn;

/// How often, and how patiently, a failed publication is retried.
///
/// Fatal errors (see [`DomainError::is_fatal`]) are never retried: the same
/// input would fail the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Creates a retry policy.
    #[must_use]
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts,
            base_backoff,
        }
    }

    /// A policy that makes a single attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// The delay after failed attempt `attempt` (1-based): the base backoff
    /// doubled `attempt - 1` times, plus up to one base backoff of jitter.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self.base_backoff.saturating_mul(1 << exponent);
        let jitter_ceiling = u64::try_from(self.base_backoff.as_millis()).unwrap_or(u64::MAX);
        if jitter_ceiling == 0 {
            return backoff;
        }
        let jitter = rand::rng().random_range(0..jitter_ceiling);
        backoff.saturating_add(Duration::from_millis(jitter))
    }

    /// Runs `operation` until it succeeds, fails fatally, or the attempts
    /// are used up.
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `operation`.
    pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_fatal() || attempt >= attempts => return Err(e),
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        operation = what,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
