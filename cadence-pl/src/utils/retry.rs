//! Retrying external calls
//!
//! Every tempo-source request goes through [`RetryPolicy::run`]: each attempt is
//! bounded by a timeout, failed attempts are retried a fixed number of times with a
//! fixed sleep in between.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

/// Marker for an attempt that exceeded the per-call timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut(pub Duration);

/// Timeout / retry / backoff settings for one external integration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound for a single attempt
    pub timeout: Duration,
    /// Additional attempts after the first failure
    pub retries: u32,
    /// Sleep between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(timeout: Duration, retries: u32, backoff: Duration) -> Self {
        Self {
            timeout,
            retries,
            backoff,
        }
    }

    /// Run `operation` until it succeeds or `retries + 1` attempts have failed.
    ///
    /// Both errors and timeouts count as failed attempts. The last error is
    /// returned once attempts are exhausted; callers that treat failures as
    /// "no data" simply discard it.
    ///
    /// # Arguments
    /// * `operation_name` - Name for logging (e.g., "deezer isrc lookup")
    /// * `operation` - Closure producing a fresh future per attempt
    pub async fn run<F, Fut, T, E>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<TimedOut> + Display,
    {
        let start_time = Instant::now();
        let max_attempts = self.retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;

            if attempt > 1 {
                tracing::debug!(
                    operation = operation_name,
                    attempt,
                    "Retrying external call"
                );
            }

            let outcome = match tokio::time::timeout(self.timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(E::from(TimedOut(self.timeout))),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms = start_time.elapsed().as_millis() as u64,
                            "External call succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if attempt >= max_attempts {
                        tracing::warn!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms = start_time.elapsed().as_millis() as u64,
                            error = %err,
                            "External call failed, retries exhausted"
                        );
                        return Err(err);
                    }

                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        backoff_ms = self.backoff.as_millis() as u64,
                        error = %err,
                        "External call failed, will retry after backoff"
                    );

                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
    }
}
