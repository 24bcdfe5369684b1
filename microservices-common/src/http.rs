//! HTTP transport seam and reqwest-backed implementation.
//!
//! The resilience pipeline talks to the network only through
//! [`HttpTransport`], so retries, timeouts and the circuit breaker can be
//! exercised against a scripted transport in tests.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::error::{CommonError, CommonResult};
use crate::settings::ConfigError;

/// HTTP verbs issued by the resilient client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
}

impl HttpMethod {
    /// Method name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

/// A fully resolved outbound request.
///
/// The body is serialized once up front so every retry sends the same payload.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute target URL including any query string
    pub url: String,
    /// JSON payload for POST/PUT
    pub body: Option<serde_json::Value>,
}

/// Status and body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body text
    pub body: String,
}

impl RawResponse {
    /// Create a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Sends a single request attempt.
///
/// Implementations report transport-level faults as
/// [`CommonError::RequestFailed`] with no status. Non-2xx responses are
/// returned as `Ok` and classified by the caller.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send one attempt of the request.
    async fn send(&self, request: &OutboundRequest) -> CommonResult<RawResponse>;
}

/// Connection-level HTTP configuration.
///
/// Per-attempt deadlines are enforced by the timeout policy, not here.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout (default: 10s)
    pub connect_timeout: Duration,
    /// Pool idle timeout (default: 90s)
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host (default: 10)
    pub pool_max_idle_per_host: usize,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            user_agent: "microservices-common/0.1".to_string(),
        }
    }
}

impl HttpConfig {
    /// Create a new HTTP config with custom connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Create a new HTTP config with custom user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Create a new HTTP config with custom pool settings.
    #[must_use]
    pub const fn with_pool_config(mut self, idle_timeout: Duration, max_idle: usize) -> Self {
        self.pool_idle_timeout = idle_timeout;
        self.pool_max_idle_per_host = max_idle;
        self
    }
}

/// Build the default header set: `Accept: application/json` plus the
/// configured static headers.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidHeader`] for a malformed name or value.
pub fn default_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::new();
    map.insert(ACCEPT, HeaderValue::from_static("application/json"));
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Build a configured reqwest client.
///
/// Creates a client with rustls TLS, connection pooling, and the given
/// default headers.
///
/// # Errors
///
/// Returns an error if a header is invalid or the client cannot be built.
///
/// # Examples
///
/// ```
/// use microservices_common::http::{HttpConfig, build_http_client};
/// use std::collections::BTreeMap;
///
/// let mut headers = BTreeMap::new();
/// headers.insert("x-api-key".to_string(), "secret".to_string());
/// let client = build_http_client(&HttpConfig::default(), &headers).expect("client");
/// ```
pub fn build_http_client(
    config: &HttpConfig,
    headers: &BTreeMap<String, String>,
) -> CommonResult<Client> {
    let client = ClientBuilder::new()
        .default_headers(default_headers(headers)?)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .use_rustls_tls()
        .build()?;
    Ok(client)
}

/// Production transport backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Wrap an already configured client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a transport with the given connection config and static headers.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be built.
    pub fn from_config(config: &HttpConfig, headers: &BTreeMap<String, String>) -> CommonResult<Self> {
        Ok(Self::new(build_http_client(config, headers)?))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &OutboundRequest) -> CommonResult<RawResponse> {
        debug!(method = request.method.as_str(), url = %request.url, "Sending request");

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}
