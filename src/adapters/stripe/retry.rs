//! Exponential backoff for provider calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::ports::PaymentError;

/// Backoff schedule for retryable provider errors.
///
/// Delays grow from `initial_interval` by `multiplier`, capped at
/// `max_interval`. No attempt starts once `max_elapsed` would be exceeded.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 2.0,
            max_interval: Duration::from_secs(15),
            max_elapsed: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    pub fn with_max_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_elapsed = elapsed;
        self
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(32) as i32);
        let millis = self.initial_interval.as_millis() as f64 * factor;
        let capped = millis.min(self.max_interval.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Runs `operation` until it succeeds, fails permanently, or the elapsed
    /// budget is spent. Returns the last error in the latter two cases.
    pub async fn retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, PaymentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PaymentError>>,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            let delay = self.delay_for(attempt);
            if started.elapsed() + delay > self.max_elapsed {
                tracing::warn!(
                    operation,
                    attempts = attempt + 1,
                    error = %err,
                    "Provider call retries exhausted"
                );
                return Err(err);
            }

            tracing::debug!(
                operation,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying provider call"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PaymentErrorCode;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_initial_interval(Duration::from_millis(1))
            .with_max_interval(Duration::from_millis(4))
            .with_max_elapsed(Duration::from_secs(2))
    }

    #[test]
    fn delays_double_until_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(8000));
        assert_eq!(policy.delay_for(5), Duration::from_secs(15));
        assert_eq!(policy.delay_for(30), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);

        let result = fast_policy()
            .retry("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(PaymentError::new(PaymentErrorCode::RateLimitExceeded, "429"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn permanent_error_short_circuits() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = fast_policy()
            .retry("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PaymentError::new(PaymentErrorCode::CardDeclined, "declined")) }
            })
            .await;

        assert_eq!(result.unwrap_err().code, PaymentErrorCode::CardDeclined);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_with_last_error_when_budget_is_spent() {
        let policy = RetryPolicy::default()
            .with_initial_interval(Duration::from_millis(5))
            .with_max_interval(Duration::from_millis(5))
            .with_max_elapsed(Duration::from_millis(12));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .retry("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(PaymentError::network(format!("attempt {}", n))) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_retryable());
        let attempts = calls.load(Ordering::SeqCst);
        assert!(attempts >= 2);
        assert_eq!(err.message, format!("attempt {}", attempts - 1));
    }
}
