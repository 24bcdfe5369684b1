//! Circuit breaker implementation for resilience.
//!
//! Counts consecutive call-level failures against a dependency. Once the
//! threshold is reached the circuit opens and calls fail fast; after the
//! break duration a single trial call is let through to decide whether the
//! circuit closes again or reopens.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{CommonError, CommonResult};
use crate::timeout::millis;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests are allowed
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, a single trial request tests recovery
    HalfOpen,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before allowing a trial
    pub break_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            break_duration: Duration::from_secs(15),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with custom failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Create a new config with custom break duration.
    #[must_use]
    pub const fn with_break_duration(mut self, duration: Duration) -> Self {
        self.break_duration = duration;
        self
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl BreakerState {
    const fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }
}

/// Circuit breaker for protecting an outbound dependency.
///
/// All transitions happen under one lock, so concurrent callers always see
/// a consistent state and at most one of them is granted the half-open trial.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::new()),
        }
    }

    /// Create a circuit breaker with default configuration.
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask permission to make a call.
    ///
    /// The returned permit must be settled with [`CallPermit::record_success`]
    /// or [`CallPermit::record_failure`]. Dropping an unsettled trial permit
    /// frees the trial slot without recording an outcome.
    ///
    /// # Errors
    ///
    /// Returns [`CommonError::CircuitOpen`] while the circuit is open, or while
    /// another caller holds the half-open trial.
    pub fn try_acquire(&self) -> CommonResult<CallPermit<'_>> {
        let mut s = self.lock();
        match s.state {
            CircuitState::Closed => Ok(CallPermit::new(self, false)),
            CircuitState::Open => {
                let elapsed = s.opened_at.map_or(Duration::MAX, |at| at.elapsed());
                if elapsed >= self.config.break_duration {
                    s.state = CircuitState::HalfOpen;
                    s.trial_in_flight = true;
                    info!(circuit = %self.name, "Circuit half-open, allowing trial call");
                    Ok(CallPermit::new(self, true))
                } else {
                    let retry_after = self.config.break_duration - elapsed;
                    debug!(circuit = %self.name, retry_after_ms = millis(retry_after), "Call rejected, circuit open");
                    Err(CommonError::circuit_open(&self.name, retry_after))
                }
            }
            CircuitState::HalfOpen => {
                if s.trial_in_flight {
                    debug!(circuit = %self.name, "Call rejected, trial in flight");
                    Err(CommonError::circuit_open(&self.name, Duration::ZERO))
                } else {
                    s.trial_in_flight = true;
                    Ok(CallPermit::new(self, true))
                }
            }
        }
    }

    fn on_success(&self, trial: bool) {
        let mut s = self.lock();
        match s.state {
            CircuitState::Closed => s.consecutive_failures = 0,
            CircuitState::HalfOpen if trial => {
                s.state = CircuitState::Closed;
                s.consecutive_failures = 0;
                s.opened_at = None;
                s.trial_in_flight = false;
                info!(circuit = %self.name, "Closing the circuit again");
            }
            // Stale outcome of a call admitted before the last transition.
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut s = self.lock();
        match s.state {
            CircuitState::Closed => {
                s.consecutive_failures += 1;
                if s.consecutive_failures >= self.config.failure_threshold {
                    self.open(&mut s);
                }
            }
            CircuitState::HalfOpen if trial => {
                s.consecutive_failures += 1;
                s.trial_in_flight = false;
                self.open(&mut s);
            }
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    fn open(&self, s: &mut BreakerState) {
        s.state = CircuitState::Open;
        s.opened_at = Some(Instant::now());
        warn!(
            circuit = %self.name,
            failures = s.consecutive_failures,
            break_secs = self.config.break_duration.as_secs_f64(),
            "Opening circuit for {} seconds to avoid resource exhaustion",
            self.config.break_duration.as_secs_f64()
        );
    }

    fn release_trial(&self) {
        let mut s = self.lock();
        if s.state == CircuitState::HalfOpen && s.trial_in_flight {
            s.trial_in_flight = false;
            debug!(circuit = %self.name, "Trial abandoned, slot released");
        }
    }

    /// Get the current circuit state.
    ///
    /// An open circuit whose break duration has elapsed still reports
    /// `Open` until the next call claims the trial.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Get the current consecutive failure count.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reset the circuit breaker to closed state.
    pub fn reset(&self) {
        *self.lock() = BreakerState::new();
    }
}

/// Permission to make one call through a [`CircuitBreaker`].
#[derive(Debug)]
#[must_use = "a permit must be settled with record_success or record_failure"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> CallPermit<'a> {
    const fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    /// Whether this call is the half-open trial.
    #[must_use]
    pub const fn is_trial(&self) -> bool {
        self.trial
    }

    /// Record that the dependency answered.
    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    /// Record a call-level failure.
    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial();
        }
    }
}
