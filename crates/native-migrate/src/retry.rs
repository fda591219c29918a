//! Exponential backoff retry policy.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{MigrateError, Result};

/// Exponential backoff with jitter and a bounded maximum delay.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    min_delay: Duration,
    factor: f64,
    max_delay: Duration,
    jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, min_delay: Duration, factor: f64, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_delay,
            factor: factor.max(1.0),
            max_delay: max_delay.max(min_delay),
            jitter: 0.0,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.min_delay_ms),
            config.factor,
            Duration::from_millis(config.max_delay_ms),
        )
        .with_jitter(config.jitter)
    }

    /// Randomize each delay by up to `fraction` in either direction.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter = fraction.clamp(0.0, 1.0);
        self
    }

    /// Delay before the retry that follows failed attempt number `attempt`
    /// (1-based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(64) as i32;
        let secs = self.min_delay.as_secs_f64() * self.factor.powi(exp);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let spread = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        base.mul_f64(1.0 + spread).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, runs out
    /// of attempts or `cancel` fires.
    ///
    /// Returns the number of attempts made together with the outcome. The
    /// count is zero only when cancellation was observed before the first
    /// attempt. Cancellation during a backoff sleep returns immediately with
    /// [`MigrateError::Cancelled`] without starting another attempt.
    pub async fn run<F, Fut, T>(&self, cancel: &CancellationToken, mut op: F) -> (u32, Result<T>)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0;

        loop {
            if cancel.is_cancelled() {
                return (attempts, Err(MigrateError::Cancelled));
            }

            attempts += 1;
            let err = match op(attempts).await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(attempts, "operation succeeded after retry");
                    }
                    return (attempts, Ok(value));
                }
                Err(err) => err,
            };

            if err.is_cancelled() || cancel.is_cancelled() {
                return (attempts, Err(MigrateError::Cancelled));
            }
            if !err.is_retryable() || attempts >= self.max_attempts {
                return (attempts, Err(err));
            }

            let delay = self.delay(attempts);
            warn!(
                attempt = attempts,
                max_attempts = self.max_attempts,
                delay = ?delay,
                error = %err,
                "attempt failed, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => return (attempts, Err(MigrateError::Cancelled)),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
