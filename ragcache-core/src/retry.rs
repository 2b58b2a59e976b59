//! Jittered exponential backoff for recoverable failures.
//!
//! Used by the orchestrator's invalidation path: store errors are retried
//! up to a configured bound before the cache marks itself
//! coherence-degraded.

use crate::config::InvalidationRetry;
use crate::error::Error;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Jitter applied to each backoff delay, as a fraction of the delay.
const JITTER_FACTOR: f64 = 0.25;

/// Retry policy executing an async operation with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Build a policy from invalidation retry configuration.
    #[must_use]
    pub fn new(config: InvalidationRetry) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
        }
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exp_delay = self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = std::cmp::min(exp_delay, self.max_delay);

        let jitter_range = delay.as_millis() as f64 * JITTER_FACTOR;
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range;
        let adjusted_ms = (delay.as_millis() as f64 + jitter).max(0.0);
        Duration::from_millis(adjusted_ms as u64)
    }

    /// Run `operation` until it succeeds, fails unrecoverably, or the
    /// retry budget is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted or immediately for
    /// non-recoverable errors.
    pub async fn execute<F, T, Fut>(&self, operation: F) -> Result<T, Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_recoverable() || attempt >= self.max_retries {
                        return Err(e);
                    }

                    attempt += 1;
                    let delay = self.calculate_delay(attempt);

                    warn!(
                        "Retry attempt {}/{} failed: {:?}, retrying in {:?}",
                        attempt, self.max_retries, e, delay
                    );

                    sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(InvalidationRetry::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(InvalidationRetry {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        })
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let policy = fast_policy(3);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = policy
            .execute(|| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Error>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let policy = fast_policy(3);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = policy
            .execute(|| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(Error::Storage("transient".into()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let policy = fast_policy(2);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<(), Error> = policy
            .execute(|| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::Storage("still failing".into()))
                }
            })
            .await;

        assert!(result.is_err());
        // Initial attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unrecoverable_error_not_retried() {
        let policy = fast_policy(3);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<(), Error> = policy
            .execute(|| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::InvalidInput("bad".into()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
