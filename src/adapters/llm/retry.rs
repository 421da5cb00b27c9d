//! Retry policy with exponential backoff for provider requests.
//!
//! Transient errors (rate limits, 5xx, network) are retried with a
//! doubling backoff; permanent errors (4xx) fail immediately. This sits
//! below the orchestrator's logical attempt loop, which counts
//! validation failures rather than network blips.

use std::future::Future;
use tokio::time::{sleep, Duration};

use super::error::ProviderError;

/// Retry policy with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries before giving up.
    pub max_retries: u32,
    /// Initial backoff duration in milliseconds.
    pub initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    /// Execute an operation, retrying transient failures.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !err.is_transient() || attempt >= self.max_retries {
                        return Err(err);
                    }

                    let backoff = self.calculate_backoff(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "transient provider error, backing off"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Exponential backoff: initial * 2^attempt, capped at the maximum.
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);
        Duration::from_millis(backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_calculate_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, 1_000, 10_000);
        assert_eq!(policy.calculate_backoff(0), Duration::from_millis(1_000));
        assert_eq!(policy.calculate_backoff(1), Duration::from_millis(2_000));
        assert_eq!(policy.calculate_backoff(2), Duration::from_millis(4_000));
        assert_eq!(policy.calculate_backoff(3), Duration::from_millis(8_000));
        assert_eq!(policy.calculate_backoff(4), Duration::from_millis(10_000));
        assert_eq!(policy.calculate_backoff(9), Duration::from_millis(10_000));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ProviderError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_error_is_retried() {
        let policy = RetryPolicy::new(3, 1, 10);
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute(|| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ProviderError::ServerError(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "boom".to_string(),
                        ))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let policy = RetryPolicy::new(3, 1, 10);
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = policy
            .execute(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::InvalidApiKey)
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let policy = RetryPolicy::new(2, 1, 10);
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = policy
            .execute(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::RateLimitExceeded)
                }
            })
            .await;

        assert!(result.is_err());
        // Initial call plus two retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
