//! Retry with exponential backoff for transient backend errors.
//!
//! Schedule: 2s → 4s → 8s, then the last observed error is returned.
//! What counts as retryable is decided by `BackendError::is_retryable`
//! (connection failures and HTTP 429/5xx); everything else fails fast.

use std::time::Duration;

use pincer_core::error::BackendError;
use tracing::warn;

/// Backoff policy for backend requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure
    pub max_retries: u32,

    /// First delay; each subsequent delay doubles
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// The delay before retry number `attempt` (0-based): base * 2^attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Run `op`, retrying on retryable errors per `policy`.
///
/// Uses `tokio::time::sleep`, so tests can drive the schedule with paused
/// time.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut last_err: Option<BackendError> = None;

    for attempt in 0..=policy.max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                if attempt < policy.max_retries {
                    let delay = policy.delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max = policy.max_retries,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Transient backend error, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(delay).await;
                } else {
                    last_err = Some(e);
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| BackendError::Network("all retry attempts failed".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn http_503() -> BackendError {
        BackendError::Api {
            status: 503,
            message: "service unavailable".into(),
        }
    }

    #[test]
    fn delay_schedule_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(2));
        assert_eq!(policy.delay(1), Duration::from_secs(4));
        assert_eq!(policy.delay(2), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn three_transient_failures_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let calls_in = calls.clone();
        let result = retry_with_backoff(RetryPolicy::default(), move || {
            let calls = calls_in.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(http_503())
                } else {
                    Ok("response")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "response");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // Backoff schedule 2s + 4s + 8s
        assert_eq!(start.elapsed(), Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn fourth_consecutive_failure_surfaces_last_error() {
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in = calls.clone();
        let result: Result<&str, _> =
            retry_with_backoff(RetryPolicy::default(), move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(http_503())
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result.unwrap_err() {
            BackendError::Api { status, .. } => assert_eq!(status, 503),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_status_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let calls_in = calls.clone();
        let result: Result<&str, _> =
            retry_with_backoff(RetryPolicy::default(), move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(BackendError::Api {
                        status: 400,
                        message: "bad request".into(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn connection_errors_retry() {
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in = calls.clone();
        let result = retry_with_backoff(RetryPolicy::default(), move || {
            let calls = calls_in.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(BackendError::Network("connection refused".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
