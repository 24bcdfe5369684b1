//! Prometheus metrics helpers.
//!
//! This module provides the counters a resilient client keeps about its
//! calls, rendered in Prometheus text format.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::circuit_breaker::CircuitState;

/// A simple counter metric.
#[derive(Debug)]
pub struct Counter {
    name: String,
    help: String,
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter.
    #[must_use]
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            value: AtomicU64::new(0),
        }
    }

    /// Increment the counter by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Get the metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Format as Prometheus text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP {} {}\n# TYPE {} counter\n{} {}\n",
            self.name, self.help, self.name, self.name, self.get()
        )
    }
}

/// A simple gauge metric.
#[derive(Debug)]
pub struct Gauge {
    name: String,
    help: String,
    value: AtomicU64,
}

impl Gauge {
    /// Create a new gauge.
    #[must_use]
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            value: AtomicU64::new(0),
        }
    }

    /// Set the gauge value.
    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Get the current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Format as Prometheus text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP {} {}\n# TYPE {} gauge\n{} {}\n",
            self.name, self.help, self.name, self.name, self.get()
        )
    }
}

/// Resilient client metrics.
#[derive(Debug)]
pub struct ClientMetrics {
    /// Calls made through the client
    pub calls: Counter,
    /// Individual transport attempts, retries included
    pub attempts: Counter,
    /// Calls that ended in an error
    pub failures: Counter,
    /// Calls rejected by an open circuit
    pub short_circuited: Counter,
    /// Circuit state: 0 closed, 1 half-open, 2 open
    pub circuit_state: Gauge,
}

impl ClientMetrics {
    /// Create new client metrics with the given prefix.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            calls: Counter::new(
                format!("{prefix}_http_calls_total"),
                "Total number of calls through the resilient client",
            ),
            attempts: Counter::new(
                format!("{prefix}_http_attempts_total"),
                "Total number of transport attempts including retries",
            ),
            failures: Counter::new(
                format!("{prefix}_http_failures_total"),
                "Total number of calls that returned an error",
            ),
            short_circuited: Counter::new(
                format!("{prefix}_http_short_circuited_total"),
                "Total number of calls rejected by an open circuit",
            ),
            circuit_state: Gauge::new(
                format!("{prefix}_http_circuit_state"),
                "Circuit state (0 closed, 1 half-open, 2 open)",
            ),
        }
    }

    /// Number of retries performed across all calls.
    #[must_use]
    pub fn retries(&self) -> u64 {
        let admitted = self.calls.get().saturating_sub(self.short_circuited.get());
        self.attempts.get().saturating_sub(admitted)
    }

    /// Update the circuit state gauge.
    pub fn record_circuit_state(&self, state: CircuitState) {
        self.circuit_state.set(match state {
            CircuitState::Closed => 0,
            CircuitState::HalfOpen => 1,
            CircuitState::Open => 2,
        });
    }

    /// Format all metrics as Prometheus text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.calls.to_prometheus(),
            self.attempts.to_prometheus(),
            self.failures.to_prometheus(),
            self.short_circuited.to_prometheus(),
            self.circuit_state.to_prometheus()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new("test_counter", "A test counter");
        assert_eq!(counter.get(), 0);
        counter.inc();
        counter.inc();
        assert_eq!(counter.get(), 2);
        assert_eq!(counter.name(), "test_counter");
    }

    #[test]
    fn test_retries_derived_from_attempts() {
        let metrics = ClientMetrics::new("catalog");

        // One call with two retries, one short-circuited call.
        metrics.calls.inc();
        metrics.attempts.inc();
        metrics.attempts.inc();
        metrics.attempts.inc();
        metrics.calls.inc();
        metrics.short_circuited.inc();

        assert_eq!(metrics.retries(), 2);
    }

    #[test]
    fn test_circuit_state_gauge() {
        let metrics = ClientMetrics::new("catalog");
        metrics.record_circuit_state(CircuitState::Open);
        assert_eq!(metrics.circuit_state.get(), 2);
        metrics.record_circuit_state(CircuitState::Closed);
        assert_eq!(metrics.circuit_state.get(), 0);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = ClientMetrics::new("catalog");
        metrics.calls.inc();

        let output = metrics.to_prometheus();
        assert!(output.contains("# TYPE catalog_http_calls_total counter"));
        assert!(output.contains("catalog_http_calls_total 1"));
        assert!(output.contains("# TYPE catalog_http_circuit_state gauge"));
    }
}
