//! Bounded retry with exponential backoff for outbound calls
//!
//! Every outbound call (backend submission, status polling, CDN upload)
//! goes through [`execute`]. Terminal-vs-retryable classification is owned
//! by the caller's error type via [`Retryable`], never re-derived from
//! error message text.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Classification hook the retry executor consults after each failure
pub trait Retryable {
    /// Whether this error must not be retried
    ///
    /// Conventionally true for HTTP statuses in [400, 500) other than 429,
    /// and for local validation failures.
    fn is_terminal(&self) -> bool;
}

/// Backoff policy for a retried operation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Multiplier applied per attempt
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Conservative policy for job submission against rate-limited backends
    pub const fn submission() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
        }
    }

    /// Lenient policy for status polling: a single retry with a 5s floor,
    /// so a flaky status check never delays the next tick for long
    pub const fn polling() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(5),
            backoff_factor: 1.0,
        }
    }

    /// Delay before the retry following failed attempt `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        self.base_delay.mul_f64(factor).min(self.max_delay)
    }
}

/// Run `operation`, retrying on non-terminal failures per `policy`
///
/// Returns the first success, the first terminal error, or the last error
/// once the retry budget is exhausted.
///
/// # Errors
///
/// Propagates the operation's error unchanged.
pub async fn execute<T, E, F, Fut>(policy: &RetryPolicy, operation_name: &str, mut operation: F) -> Result<T, E>
where
    E: Retryable + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_terminal() => {
                tracing::debug!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    error = %e,
                    "terminal error, not retrying"
                );
                return Err(e);
            }
            Err(e) => {
                if attempt >= policy.max_retries {
                    tracing::warn!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        error = %e,
                        "retry budget exhausted"
                    );
                    return Err(e);
                }

                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
