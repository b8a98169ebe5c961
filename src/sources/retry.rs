//! Exponential backoff for enrichment fetches.
//!
//! Only [`FetchError::Transient`] failures are retried; client and decode
//! errors return on the first attempt.

use std::future::Future;
use std::iter::Take;
use std::time::Duration;

use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;

use crate::config::RetrySettings;
use crate::error::FetchError;

/// Retry ceiling and backoff shape.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_retries` retries after the first
    /// attempt, doubling from `base_delay` up to `max_delay`.
    #[must_use]
    pub const fn new(max_retries: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Delays before each retry, in order.
    #[must_use]
    pub fn delays(&self) -> Take<ExponentialBackoff> {
        // tokio-retry computes base^n * factor; base 2 with factor d/2
        // yields d, 2d, 4d, ...
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        ExponentialBackoff::from_millis(2)
            .factor((base_ms / 2).max(1))
            .max_delay(self.max_delay)
            .take(self.max_retries)
    }

    /// Runs `action`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted, or the first
    /// non-retryable error.
    pub async fn run<T, A, Fut>(&self, operation: &'static str, action: A) -> Result<T, FetchError>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        RetryIf::start(self.delays(), action, |err: &FetchError| {
            let retry = err.is_retryable();
            if retry {
                tracing::debug!(operation, error = %err, "retrying fetch");
            }
            retry
        })
        .await
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(settings.max_retries, settings.base_delay, settings.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn fast_policy(retries: usize) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::from_millis(2), Duration::from_millis(10))
    }

    #[test]
    fn delays_double_and_cap() {
        let policy = RetryPolicy::new(4, Duration::from_millis(200), Duration::from_millis(1000));
        let delays: Vec<Duration> = policy.delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
                Duration::from_millis(1000),
            ]
        );
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result = fast_policy(3)
            .run("test", || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(FetchError::Transient("timeout".to_string()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_stop_at_ceiling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), FetchError> = fast_policy(2)
            .run("test", || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(FetchError::Transient("503".to_string()))
                }
            })
            .await;
        assert!(matches!(result, Err(FetchError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), FetchError> = fast_policy(5)
            .run("test", || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(FetchError::Client {
                        status: 404,
                        message: "not found".to_string(),
                    })
                }
            })
            .await;
        assert!(matches!(result, Err(FetchError::Client { status: 404, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
