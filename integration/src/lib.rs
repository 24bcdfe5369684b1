//! Shared helpers for the end-to-end tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Once;
use std::time::Duration;

use microservices_common::{CircuitBreakerConfig, ResiliencePolicy, RetryConfig};

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("microservices_common=debug")
            .with_test_writer()
            .try_init();
    });
}

/// Default policy shape with millisecond delays, for tests on real time.
#[must_use]
pub fn fast_policy() -> ResiliencePolicy {
    ResiliencePolicy::default()
        .with_timeout(Duration::from_millis(500))
        .with_retry(
            RetryConfig::default()
                .with_base_delay(Duration::from_millis(1))
                .without_jitter(),
        )
        .with_circuit_breaker(CircuitBreakerConfig::default().with_break_duration(Duration::from_millis(200)))
}
