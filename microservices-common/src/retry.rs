//! Retry policy implementation with exponential backoff and jitter.
//!
//! The delay before retry `n` is `base_delay * multiplier^n` plus a random
//! jitter in `[0, max_jitter)`, which keeps many clients from retrying a
//! recovering dependency in lockstep.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::{CommonError, CommonResult};
use crate::timeout::millis;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Base delay scaled by `multiplier^n`
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Exclusive upper bound of the random jitter added to each delay
    pub max_jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom max retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Create a new retry config with custom base delay.
    #[must_use]
    pub const fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Create a new retry config with custom jitter bound.
    #[must_use]
    pub const fn with_max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    /// Create a new retry config without jitter.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.max_jitter = Duration::ZERO;
        self
    }
}

/// Retry policy for executing operations with automatic retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy with the given configuration.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create a retry policy with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Backoff component of the delay before retry `retry` (1-based).
    ///
    /// Saturates at [`Duration::MAX`] when the exponential term overflows.
    #[must_use]
    pub fn backoff_for_retry(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.config.base_delay.as_secs_f64() * self.config.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Full delay before retry `retry` (1-based): backoff plus jitter.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.backoff_for_retry(retry).saturating_add(self.jitter())
    }

    fn jitter(&self) -> Duration {
        let bound_ms = millis(self.config.max_jitter);
        if bound_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..bound_ms))
    }

    /// Check if an error should be retried after `retries_done` retries.
    #[must_use]
    pub const fn should_retry(&self, error: &CommonError, retries_done: u32) -> bool {
        retries_done < self.config.max_retries && error.is_transient()
    }

    /// Execute an async operation with retries.
    ///
    /// Transient failures are retried after the computed delay; each retry is
    /// logged with its delay and number. Terminal errors return immediately.
    ///
    /// # Errors
    ///
    /// Returns the first terminal error, or the last transient error once
    /// all retries are exhausted.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> CommonResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CommonResult<T>>,
    {
        let mut retries_done = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.should_retry(&error, retries_done) {
                        return Err(error);
                    }
                    retries_done += 1;
                    let delay = self.delay_for_retry(retries_done);
                    warn!(
                        delay_secs = delay.as_secs_f64(),
                        retry = retries_done,
                        error = %error,
                        "Delaying for {:.3} seconds, then making retry {}",
                        delay.as_secs_f64(),
                        retries_done
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Get the maximum number of retries.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_defaults()
    }
}
