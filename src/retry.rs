//! Retry policy for transient failures.
//!
//! Implements exponential backoff with configurable parameters. Every layer that
//! retries (connection supervision, generation calls, admin media sends, topic
//! lookups) owns its own policy; retries never cross layer boundaries.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy implementing capped exponential backoff without jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff before the first retry, in seconds.
    pub initial_backoff_secs: u64,
    /// Maximum backoff duration in seconds (cap for exponential growth).
    pub max_backoff_secs: u64,
    /// Multiplier applied to backoff after each retry.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Language model calls: 10 attempts, 2s doubling up to 30s.
    pub fn generation() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff_secs: 2,
            max_backoff_secs: 30,
            backoff_multiplier: 2.0,
        }
    }

    /// Media sent to the approver: 3 attempts, 2s doubling up to 10s.
    pub fn admin_media() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_secs: 2,
            max_backoff_secs: 10,
            backoff_multiplier: 2.0,
        }
    }

    /// Spreadsheet lookups: 10 attempts, 4s doubling up to 60s.
    pub fn topic_lookup() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff_secs: 4,
            max_backoff_secs: 60,
            backoff_multiplier: 2.0,
        }
    }

    /// Connection supervision. Attempts are unbounded, only the delay is capped.
    pub fn reconnect() -> Self {
        Self {
            max_attempts: u32::MAX,
            initial_backoff_secs: 10,
            max_backoff_secs: 300,
            backoff_multiplier: 2.0,
        }
    }

    /// Calculate backoff duration in seconds for a given retry count.
    ///
    /// Uses `initial_backoff * multiplier^retry_count`, capped at `max_backoff_secs`.
    pub fn backoff_secs(&self, retry_count: u32) -> u64 {
        let exponent = retry_count.min(i32::MAX as u32) as i32;
        let backoff = self.initial_backoff_secs as f64 * self.backoff_multiplier.powi(exponent);
        backoff.min(self.max_backoff_secs as f64) as u64
    }

    pub fn backoff(&self, retry_count: u32) -> Duration {
        Duration::from_secs(self.backoff_secs(retry_count))
    }

    /// Check if another attempt is allowed after `attempts` attempts have failed.
    pub fn should_retry(&self, retryable: bool, attempts: u32) -> bool {
        retryable && attempts < self.max_attempts
    }
}

/// The error of the last attempt, together with how many attempts were made.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub error: E,
    pub attempts: u32,
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the policy
/// runs out of attempts.
pub async fn retry_async<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    operation: &str,
    is_retryable: R,
    mut op: F,
) -> Result<T, Exhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !policy.should_retry(is_retryable(&error), attempts) {
                    return Err(Exhausted { error, attempts });
                }
                let backoff = policy.backoff(attempts - 1);
                warn!(
                    operation,
                    attempt = attempts,
                    backoff_secs = backoff.as_secs(),
                    "{} failed: {}",
                    operation,
                    error
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
