use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{EnrollError, EnrollResult};

/// Retry configuration with jitter
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including initial attempt)
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds
    pub base_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds
    pub max_backoff_ms: u64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 200,
            max_backoff_ms: 5_000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt + 1` (0-indexed): base * 2^attempt, capped, jittered.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp_backoff = (self.base_backoff_ms as f64) * 2_f64.powi(attempt.min(31) as i32);
        let capped = exp_backoff.min(self.max_backoff_ms as f64);

        let jitter_range = capped * self.jitter_factor.clamp(0.0, 1.0);
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };

        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }
}

/// Run `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or the attempt ceiling is hit. The last error is returned.
pub async fn retry_with_backoff<T, F, Fut>(
    operation_name: &str,
    config: &RetryConfig,
    should_retry: impl Fn(&EnrollError) -> bool,
    mut operation: F,
) -> EnrollResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EnrollResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation = operation_name, attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if !should_retry(&err) => {
                debug!(operation = operation_name, error = %err, "Permanent error, not retrying");
                return Err(err);
            }
            Err(err) if attempt + 1 >= max_attempts => {
                warn!(
                    operation = operation_name,
                    attempts = attempt + 1,
                    error = %err,
                    "All retry attempts exhausted"
                );
                return Err(err);
            }
            Err(err) => {
                let backoff = config.backoff(attempt);
                debug!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient error, backing off before retry"
                );
                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_jitter(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_backoff_ms: 100,
            max_backoff_ms: 1_000,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = no_jitter(5);
        assert_eq!(config.backoff(0), Duration::from_millis(100));
        assert_eq!(config.backoff(1), Duration::from_millis(200));
        assert_eq!(config.backoff(3), Duration::from_millis(800));
        assert_eq!(config.backoff(4), Duration::from_millis(1_000));
        assert_eq!(config.backoff(40), Duration::from_millis(1_000));
    }

    #[test]
    fn jitter_stays_within_range() {
        let config = RetryConfig {
            jitter_factor: 0.5,
            ..no_jitter(3)
        };
        for _ in 0..100 {
            let backoff = config.backoff(1).as_millis();
            assert!((100..=300).contains(&backoff));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff("flaky", &no_jitter(3), EnrollError::is_transient, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(EnrollError::NetworkTransient("connection reset".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_attempt_ceiling() {
        let calls = AtomicU32::new(0);
        let result: EnrollResult<()> =
            retry_with_backoff("down", &no_jitter(3), EnrollError::is_transient, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EnrollError::NetworkTransient("connection refused".into()))
            })
            .await;

        assert!(matches!(result, Err(EnrollError::NetworkTransient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: EnrollResult<()> =
            retry_with_backoff("rejected", &no_jitter(5), EnrollError::is_transient, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EnrollError::Rejected("invalid".into()))
            })
            .await;

        assert!(matches!(result, Err(EnrollError::Rejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let _ = retry_with_backoff("once", &no_jitter(0), EnrollError::is_transient, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(EnrollError::NetworkTransient("x".into()))
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
