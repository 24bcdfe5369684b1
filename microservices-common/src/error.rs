//! Centralized error types for the shared microservices toolkit.
//!
//! This module provides a unified error type for the resilient HTTP client
//! and the document repository, with built-in transient-failure
//! classification used by the retry and circuit breaker policies.

use std::time::Duration;
use thiserror::Error;

use crate::settings::ConfigError;

/// Result type for toolkit operations.
pub type CommonResult<T> = Result<T, CommonError>;

/// Common error type for client and repository operations.
///
/// Errors are classified as either transient or terminal. Transient errors
/// are retried by the retry policy and counted by the circuit breaker;
/// terminal errors propagate to the caller untouched.
#[derive(Error, Debug)]
pub enum CommonError {
    /// A single attempt exceeded the configured timeout
    #[error("Operation timed out after {}ms", timeout.as_millis())]
    TimeoutExceeded {
        /// The timeout that was exceeded
        timeout: Duration,
    },

    /// Circuit breaker refused the call
    #[error("Circuit breaker open for {service}")]
    CircuitOpen {
        /// The service whose circuit is open
        service: String,
        /// Time remaining until a trial call is allowed
        retry_after: Duration,
    },

    /// Non-2xx status, transport fault, or undecodable response body
    #[error("Request failed: {body}")]
    RequestFailed {
        /// HTTP status, `None` when the request never produced a response
        status: Option<u16>,
        /// Raw response body or fault description
        body: String,
    },

    /// Invalid argument provided
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Backing document store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration could not be loaded or validated
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CommonError {
    /// Check if this error is transient.
    ///
    /// Transient errors are timeouts, transport-level faults, HTTP 408 and
    /// HTTP 5xx responses.
    ///
    /// # Examples
    ///
    /// ```
    /// use microservices_common::CommonError;
    /// use std::time::Duration;
    ///
    /// let err = CommonError::TimeoutExceeded { timeout: Duration::from_secs(3) };
    /// assert!(err.is_transient());
    ///
    /// let err = CommonError::request_failed(Some(404), "not found");
    /// assert!(!err.is_transient());
    /// ```
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::TimeoutExceeded { .. } => true,
            Self::RequestFailed { status, .. } => match status {
                None => true,
                Some(code) => *code == 408 || *code >= 500,
            },
            _ => false,
        }
    }

    /// Create a request failed error.
    #[must_use]
    pub fn request_failed(status: Option<u16>, body: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            body: body.into(),
        }
    }

    /// Create a circuit open error for the given service.
    #[must_use]
    pub fn circuit_open(service: impl Into<String>, retry_after: Duration) -> Self {
        Self::CircuitOpen {
            service: service.into(),
            retry_after,
        }
    }

    /// Create an invalid argument error with the given message.
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a store error with the given message.
    #[must_use]
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}

impl From<reqwest::Error> for CommonError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed {
            status: err.status().map(|s| s.as_u16()),
            body: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(CommonError::TimeoutExceeded { timeout: Duration::from_secs(3) }.is_transient());
        assert!(CommonError::request_failed(None, "connection refused").is_transient());
        assert!(CommonError::request_failed(Some(503), "unavailable").is_transient());
        assert!(CommonError::request_failed(Some(408), "timeout").is_transient());
    }

    #[test]
    fn test_terminal_errors() {
        assert!(!CommonError::request_failed(Some(404), "not found").is_transient());
        assert!(!CommonError::request_failed(Some(400), "bad").is_transient());
        assert!(!CommonError::circuit_open("inventory", Duration::from_secs(15)).is_transient());
        assert!(!CommonError::invalid_argument("item").is_transient());
        assert!(!CommonError::store("down").is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = CommonError::request_failed(Some(404), "not found");
        assert_eq!(err.to_string(), "Request failed: not found");

        let err = CommonError::circuit_open("inventory", Duration::from_secs(15));
        assert_eq!(err.to_string(), "Circuit breaker open for inventory");

        let err = CommonError::TimeoutExceeded { timeout: Duration::from_secs(3) };
        assert_eq!(err.to_string(), "Operation timed out after 3000ms");
    }
}
