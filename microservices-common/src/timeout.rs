//! Per-attempt timeout policy.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::error::{CommonError, CommonResult};
use crate::settings::DEFAULT_TIMEOUT_SECONDS;

/// Bounds a single outbound attempt by a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    duration: Duration,
}

impl TimeoutPolicy {
    /// Creates a new timeout policy with the given duration
    #[must_use]
    pub const fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Creates a new timeout policy from seconds
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// The configured duration
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Run `attempt`, failing with [`CommonError::TimeoutExceeded`] if it
    /// does not complete in time. The attempt future is dropped on timeout.
    ///
    /// # Errors
    ///
    /// Returns the attempt's own error, or `TimeoutExceeded`.
    pub async fn execute<F, T>(&self, attempt: F) -> CommonResult<T>
    where
        F: Future<Output = CommonResult<T>>,
    {
        match timeout(self.duration, attempt).await {
            Ok(result) => result,
            Err(_) => {
                debug!(timeout_ms = millis(self.duration), "Attempt timed out");
                Err(CommonError::TimeoutExceeded {
                    timeout: self.duration,
                })
            }
        }
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::from_secs(DEFAULT_TIMEOUT_SECONDS)
    }
}
