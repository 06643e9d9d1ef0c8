//! Explicit retry policies with exponential backoff.

use std::time::Duration;

/// An exponential backoff schedule with a bounded number of retries.
///
/// `max_retries` counts retries *after* the first attempt, so an
/// operation runs at most `max_retries + 1` times. The delay before
/// retry `n` (zero-based) is `base * multiplier^n`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub multiplier: f64,
    pub max: Duration,
    pub max_retries: u32,
}

impl RetryPolicy {
    pub const fn new(base: Duration, multiplier: f64, max: Duration, max_retries: u32) -> Self {
        Self {
            base,
            multiplier,
            max,
            max_retries,
        }
    }

    /// Message-handling policy: 2s base, doubling, 30s cap, 3 retries
    /// before the message goes to the dead-letter topic.
    pub const fn consumer() -> Self {
        Self::new(Duration::from_secs(2), 2.0, Duration::from_secs(30), 3)
    }

    /// Payment-gateway policy: 2s base, doubling, 10s cap, 3 attempts in
    /// total.
    pub const fn gateway() -> Self {
        Self::new(Duration::from_secs(2), 2.0, Duration::from_secs(10), 2)
    }

    /// Publish policy: short delays, 3 retries.
    pub const fn publisher() -> Self {
        Self::new(Duration::from_millis(100), 2.0, Duration::from_secs(1), 3)
    }

    /// A zero-delay policy for tests.
    pub const fn immediate(max_retries: u32) -> Self {
        Self::new(Duration::ZERO, 1.0, Duration::ZERO, max_retries)
    }

    /// Total number of attempts this policy allows.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before the given zero-based retry.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let scaled = self.base.mul_f64(self.multiplier.powi(retry as i32));
        scaled.min(self.max)
    }
}

/// Runs `op` under the policy, sleeping between attempts.
///
/// The closure receives the zero-based attempt index. Returns the first
/// success, or the error of the final attempt.
pub async fn retry_with<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    total = policy.total_attempts(),
                    %err,
                    ?delay,
                    "attempt failed, backing off"
                );
                metrics::counter!("saga_retries_total").increment(1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
