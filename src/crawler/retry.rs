//! Bounded retry with a configurable backoff schedule
//!
//! A `RetryPolicy` describes how often an operation is attempted and how long
//! to wait between attempts. `retry` drives any fallible async operation with
//! a policy and hands the last error back to the caller untouched.

use crate::config::RetryPolicyConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Attempt budget and delay schedule of a retried operation
///
/// The wait after failed attempt `i` (zero-based) is `base_delay + step * i`.
/// A zero `step` gives a constant delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub step: Duration,
}

impl RetryPolicy {
    /// Delay growing by `step` after every failure
    pub fn linear(max_attempts: u32, base_delay: Duration, step: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            step,
        }
    }

    /// Same delay after every failure
    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self::linear(max_attempts, delay, Duration::ZERO)
    }

    /// Wait before the attempt following failed attempt `attempt`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay + self.step * attempt
    }
}

impl From<&RetryPolicyConfig> for RetryPolicy {
    fn from(config: &RetryPolicyConfig) -> Self {
        Self::linear(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.step_ms),
        )
    }
}

/// Runs `operation` until it succeeds or the policy's attempts are spent
///
/// Sleeps between attempts according to the policy but never after the last
/// one. The final failure is returned as produced by the operation.
///
/// # Arguments
///
/// * `policy` - Attempt budget and delay schedule (at least one attempt is made)
/// * `target` - What is being retried, for log messages
/// * `operation` - Produces one attempt per call
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, target: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let delay = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 >= attempts => return Err(e),
            Err(e) => {
                let delay = policy.delay_after(attempt);
                tracing::debug!(
                    "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                    attempt + 1,
                    attempts,
                    target,
                    e,
                    delay
                );
                delay
            }
        };

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
