//! Type-safe startup settings with validation.
//!
//! Settings are plain `Deserialize` structs so they can be bound from a
//! configuration file section, or loaded from environment variables through
//! [`HttpClientSettings::from_env`] and friends. Every loader has a
//! `from_lookup` twin that reads keys through a caller-supplied function.

use std::collections::BTreeMap;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::HeaderName;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use url::Url;

/// Default per-attempt timeout for outbound HTTP calls.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 3;

/// Default document store server selection timeout in seconds.
pub const DEFAULT_STORE_TIMEOUT_SECONDS: u64 = 30;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Offending field
        field: String,
        /// Parse failure description
        reason: String,
    },

    /// Invalid port number
    #[error("Invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// Invalid timeout value
    #[error("Invalid timeout: must be greater than 0")]
    InvalidTimeout,

    /// Invalid header name
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader {
        /// Header name as configured
        name: String,
        /// Validation failure description
        reason: String,
    },

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parse failure description
        reason: String,
    },
}

/// Logical service identity.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Service name, also used as the document database name
    pub service_name: String,
}

impl ServiceSettings {
    /// Create service settings with the given name.
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Load from environment variables (`SERVICE_NAME`).
    ///
    /// # Errors
    ///
    /// Returns an error if the service name is missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(env_lookup)
    }

    /// Load through a key lookup function.
    ///
    /// # Errors
    ///
    /// Returns an error if the service name is missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_name = lookup("SERVICE_NAME")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingRequired("SERVICE_NAME".to_string()))?;
        Ok(Self { service_name })
    }
}

/// Resilient HTTP client parameters.
///
/// Header names are case-insensitive; setting the same header twice keeps the
/// last value.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HttpClientSettings {
    /// Base URL every endpoint is resolved against
    pub base_url: String,
    /// Static headers sent with every request, keyed by lowercase name
    #[serde(default, deserialize_with = "deserialize_headers")]
    pub headers: BTreeMap<String, String>,
    /// Per-attempt timeout in seconds (default: 3)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

const fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn deserialize_headers<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, String>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .collect())
}

impl HttpClientSettings {
    /// Create settings for the given base URL with default timeout and no headers.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: BTreeMap::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    /// Add a static header, replacing any earlier value for the same name.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Set the per-attempt timeout in seconds.
    #[must_use]
    pub const fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Per-attempt timeout as a duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Load from environment variables prefixed with `prefix`.
    ///
    /// Reads `{PREFIX}_BASE_URL`, `{PREFIX}_TIMEOUT_SECONDS` and
    /// `{PREFIX}_HEADERS` (`name=value` pairs separated by `;`).
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is missing, malformed, or fails validation.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(prefix, env_lookup)
    }

    /// Load through a key lookup function. See [`Self::from_env`] for keys.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is missing, malformed, or fails validation.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url_key = format!("{prefix}_BASE_URL");
        let base_url = lookup(&base_url_key)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingRequired(base_url_key))?;

        let mut settings = Self::new(base_url).with_timeout_seconds(parse_value(
            &lookup,
            &format!("{prefix}_TIMEOUT_SECONDS"),
            DEFAULT_TIMEOUT_SECONDS,
        )?);

        let headers_key = format!("{prefix}_HEADERS");
        if let Some(raw) = lookup(&headers_key) {
            for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                let (name, value) = pair.split_once('=').ok_or_else(|| ConfigError::ParseError {
                    name: headers_key.clone(),
                    reason: format!("expected name=value, got `{pair}`"),
                })?;
                settings = settings.with_header(name.trim(), value.trim());
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-http(s) base URL, a zero timeout, or an
    /// invalid header name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidUrl {
            field: "base_url".to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                field: "base_url".to_string(),
                reason: format!("unsupported scheme `{}`", url.scheme()),
            });
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        for name in self.headers.keys() {
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Document store connection settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DocumentStoreSettings {
    /// Store host
    pub host: String,
    /// Store port
    pub port: u16,
    /// Seconds to wait for a reachable server (default: 30)
    #[serde(default = "default_store_timeout_seconds")]
    pub timeout_seconds: u64,
}

const fn default_store_timeout_seconds() -> u64 {
    DEFAULT_STORE_TIMEOUT_SECONDS
}

impl Default for DocumentStoreSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 27017,
            timeout_seconds: DEFAULT_STORE_TIMEOUT_SECONDS,
        }
    }
}

impl DocumentStoreSettings {
    /// Connection string derived from host and port.
    #[must_use]
    pub fn connection_string(&self) -> String {
        format!("mongodb://{}:{}", self.host, self.port)
    }

    /// Server selection timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Load from `DOCUMENT_STORE_HOST`, `DOCUMENT_STORE_PORT` and
    /// `DOCUMENT_STORE_TIMEOUT_SECONDS`.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is malformed or the port or timeout is
    /// zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(env_lookup)
    }

    /// Load through a key lookup function.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is malformed or the port or timeout is
    /// zero.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let settings = Self {
            host: lookup("DOCUMENT_STORE_HOST").unwrap_or(defaults.host),
            port: parse_value(&lookup, "DOCUMENT_STORE_PORT", defaults.port)?,
            timeout_seconds: parse_value(&lookup, "DOCUMENT_STORE_TIMEOUT_SECONDS", defaults.timeout_seconds)?,
        };
        if settings.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if settings.timeout_seconds == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(settings)
    }
}

/// Message broker settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BrokerSettings {
    /// Broker host address
    pub host: String,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
        }
    }
}

impl BrokerSettings {
    /// Load from `BROKER_HOST`.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(env_lookup)
    }

    /// Load through a key lookup function.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup("BROKER_HOST")
            .filter(|s| !s.is_empty())
            .map_or_else(Self::default, |host| Self { host })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn parse_value<T, F>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_http_settings_defaults() {
        let settings = HttpClientSettings::new("https://svc");
        assert_eq!(settings.timeout_seconds, 3);
        assert_eq!(settings.timeout(), Duration::from_secs(3));
        assert!(settings.headers.is_empty());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_headers_case_insensitive_last_write_wins() {
        let settings = HttpClientSettings::new("https://svc")
            .with_header("X-Api-Key", "first")
            .with_header("x-api-key", "second");
        assert_eq!(settings.headers.len(), 1);
        assert_eq!(settings.headers.get("x-api-key").map(String::as_str), Some("second"));
    }

    #[test]
    fn test_http_settings_from_lookup() {
        let lookup = lookup_from(&[
            ("INVENTORY_BASE_URL", "http://inventory:5000"),
            ("INVENTORY_TIMEOUT_SECONDS", "5"),
            ("INVENTORY_HEADERS", "Authorization=Bearer abc; X-Tenant=acme"),
        ]);
        let settings = HttpClientSettings::from_lookup("INVENTORY", lookup).unwrap();
        assert_eq!(settings.base_url, "http://inventory:5000");
        assert_eq!(settings.timeout_seconds, 5);
        assert_eq!(
            settings.headers.get("authorization").map(String::as_str),
            Some("Bearer abc")
        );
        assert_eq!(settings.headers.get("x-tenant").map(String::as_str), Some("acme"));
    }

    #[test]
    fn test_http_settings_rejects_bad_values() {
        let missing = HttpClientSettings::from_lookup("X", lookup_from(&[]));
        assert!(matches!(missing, Err(ConfigError::MissingRequired(_))));

        let bad_url = HttpClientSettings::from_lookup("X", lookup_from(&[("X_BASE_URL", "not a url")]));
        assert!(matches!(bad_url, Err(ConfigError::InvalidUrl { .. })));

        let bad_scheme = HttpClientSettings::new("ftp://svc").validate();
        assert!(matches!(bad_scheme, Err(ConfigError::InvalidUrl { .. })));

        let zero = HttpClientSettings::new("https://svc").with_timeout_seconds(0).validate();
        assert!(matches!(zero, Err(ConfigError::InvalidTimeout)));

        let bad_header = HttpClientSettings::new("https://svc")
            .with_header("bad header", "v")
            .validate();
        assert!(matches!(bad_header, Err(ConfigError::InvalidHeader { .. })));

        let bad_timeout = HttpClientSettings::from_lookup(
            "X",
            lookup_from(&[("X_BASE_URL", "https://svc"), ("X_TIMEOUT_SECONDS", "soon")]),
        );
        assert!(matches!(bad_timeout, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_http_settings_deserialize() {
        let json = r#"{"base_url": "https://svc", "headers": {"X-Key": "v"}}"#;
        let settings: HttpClientSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.timeout_seconds, 3);
        assert_eq!(settings.headers.get("x-key").map(String::as_str), Some("v"));
    }

    #[test]
    fn test_document_store_connection_string() {
        let settings = DocumentStoreSettings::from_lookup(lookup_from(&[
            ("DOCUMENT_STORE_HOST", "mongo"),
            ("DOCUMENT_STORE_PORT", "27018"),
        ]))
        .unwrap();
        assert_eq!(settings.connection_string(), "mongodb://mongo:27018");

        let defaults = DocumentStoreSettings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(defaults.connection_string(), "mongodb://localhost:27017");

        let zero = DocumentStoreSettings::from_lookup(lookup_from(&[("DOCUMENT_STORE_PORT", "0")]));
        assert!(matches!(zero, Err(ConfigError::InvalidPort)));

        assert_eq!(defaults.timeout(), Duration::from_secs(30));
        let quick = DocumentStoreSettings::from_lookup(lookup_from(&[("DOCUMENT_STORE_TIMEOUT_SECONDS", "2")])).unwrap();
        assert_eq!(quick.timeout(), Duration::from_secs(2));
        let never = DocumentStoreSettings::from_lookup(lookup_from(&[("DOCUMENT_STORE_TIMEOUT_SECONDS", "0")]));
        assert!(matches!(never, Err(ConfigError::InvalidTimeout)));
    }

    #[test]
    fn test_service_and_broker_settings() {
        let service = ServiceSettings::from_lookup(lookup_from(&[("SERVICE_NAME", "catalog")])).unwrap();
        assert_eq!(service.service_name, "catalog");
        assert!(ServiceSettings::from_lookup(lookup_from(&[])).is_err());

        let broker = BrokerSettings::from_lookup(lookup_from(&[("BROKER_HOST", "rabbitmq")]));
        assert_eq!(broker.host, "rabbitmq");
        assert_eq!(BrokerSettings::from_lookup(lookup_from(&[])).host, "localhost");
    }
}
