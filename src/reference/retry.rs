//! Bounded retry with exponential backoff for upstream calls

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::UpstreamError;

/// Retry configuration for upstream calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay after the first failed attempt
    pub initial_backoff: Duration,

    /// Factor applied to the delay after every further failure
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay slept after failed attempt number `attempt` (1-based)
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds, fails terminally, or attempts run out.
    ///
    /// Dropping the returned future abandons the loop, including a pending
    /// backoff sleep.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut call: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Upstream call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    warn!(operation, attempt, error = %e, "Upstream call failed, not retryable");
                    return Err(e);
                }
                Err(e) if attempt >= max_attempts => {
                    warn!(operation, attempt, error = %e, "Upstream call failed, attempts exhausted");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.backoff_after(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Upstream call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_after(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_after(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_after(3), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_retried_until_exhausted() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<(), _> = RetryPolicy::default()
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(UpstreamError::Status(500))
            })
            .await;

        assert_eq!(result, Err(UpstreamError::Status(500)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2s + 4s between the three attempts, nothing after the last
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(7), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_not_retried() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<(), _> = RetryPolicy::default()
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(UpstreamError::Status(400))
            })
            .await;

        assert_eq!(result, Err(UpstreamError::Status(400)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transport_failure() {
        let calls = AtomicU32::new(0);

        let result = RetryPolicy::default()
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(UpstreamError::Transport("connection reset".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
