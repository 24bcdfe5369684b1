//! Generic typed HTTP client wrapped in a resilience pipeline.
//!
//! Every call goes through, from outermost to innermost:
//!
//! 1. the circuit breaker, which counts call-level outcomes and fails fast
//!    while open;
//! 2. the retry policy, which retries transient failures with jittered
//!    exponential backoff;
//! 3. the timeout policy, which bounds each individual attempt.
//!
//! Each client owns its configuration and breaker state; two clients never
//! share counters.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::error::{CommonError, CommonResult};
use crate::http::{HttpConfig, HttpMethod, HttpTransport, OutboundRequest, RawResponse, ReqwestTransport};
use crate::metrics::ClientMetrics;
use crate::query::{build_query, with_query};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::settings::{DEFAULT_TIMEOUT_SECONDS, HttpClientSettings};
use crate::timeout::TimeoutPolicy;

/// Timeout, retry and circuit breaker settings for one client.
#[derive(Debug, Clone)]
pub struct ResiliencePolicy {
    /// Per-attempt timeout (default: 3s)
    pub timeout: Duration,
    /// Retry settings (default: 5 retries, 2^n seconds plus up to 1s jitter)
    pub retry: RetryConfig,
    /// Circuit breaker settings (default: 3 failures, 15s break)
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl ResiliencePolicy {
    /// Default policy with the timeout taken from the client settings.
    #[must_use]
    pub fn from_settings(settings: &HttpClientSettings) -> Self {
        Self::default().with_timeout(settings.timeout())
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the circuit breaker configuration.
    #[must_use]
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }
}

/// Typed JSON client over an [`HttpTransport`] with timeout, retry and
/// circuit breaker policies.
pub struct ResilientClient<X = ReqwestTransport> {
    base_url: String,
    transport: X,
    timeout: TimeoutPolicy,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
    metrics: ClientMetrics,
}

impl ResilientClient<ReqwestTransport> {
    /// Build a reqwest-backed client from settings with the default policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the HTTP client
    /// cannot be built.
    pub fn from_settings(settings: &HttpClientSettings) -> CommonResult<Self> {
        Self::from_settings_with_policy(settings, ResiliencePolicy::from_settings(settings))
    }

    /// Build a reqwest-backed client from settings with a custom policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the HTTP client
    /// cannot be built.
    pub fn from_settings_with_policy(
        settings: &HttpClientSettings,
        policy: ResiliencePolicy,
    ) -> CommonResult<Self> {
        settings.validate()?;
        let transport = ReqwestTransport::from_config(&HttpConfig::default(), &settings.headers)?;
        Ok(Self::with_transport(&settings.base_url, transport, policy))
    }
}

impl<X: HttpTransport> ResilientClient<X> {
    /// Create a client over an arbitrary transport.
    pub fn with_transport(base_url: impl Into<String>, transport: X, policy: ResiliencePolicy) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let metrics = ClientMetrics::new(&metrics_prefix(&base_url));
        Self {
            breaker: CircuitBreaker::new(base_url.clone(), policy.circuit_breaker),
            timeout: TimeoutPolicy::new(policy.timeout),
            retry: RetryPolicy::new(policy.retry),
            base_url,
            transport,
            metrics,
        }
    }

    /// Base URL with any trailing slash removed.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve an endpoint against the base URL without mutating the client.
    #[must_use]
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Current circuit breaker state.
    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Call metrics for this client.
    #[must_use]
    pub const fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    /// GET `base/endpoint` and decode a sequence of `R`.
    ///
    /// # Errors
    ///
    /// `CircuitOpen`, `TimeoutExceeded` after retries, or `RequestFailed`.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn get<R>(&self, endpoint: &str) -> CommonResult<Vec<R>>
    where
        R: DeserializeOwned,
    {
        let request = OutboundRequest {
            method: HttpMethod::Get,
            url: self.endpoint_url(endpoint),
            body: None,
        };
        self.execute(request).await
    }

    /// GET `base/endpoint?query`, with the query built from `request`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `request` is not a flat record, otherwise as
    /// [`Self::get`].
    #[instrument(skip(self, request), fields(base_url = %self.base_url))]
    pub async fn get_with_query<T, R>(&self, endpoint: &str, request: &T) -> CommonResult<Vec<R>>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let query = build_query(request)?;
        let request = OutboundRequest {
            method: HttpMethod::Get,
            url: with_query(&self.endpoint_url(endpoint), &query),
            body: None,
        };
        self.execute(request).await
    }

    /// POST `body` as JSON to `base/endpoint` and decode a sequence of `R`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the body cannot be serialized, otherwise as
    /// [`Self::get`].
    #[instrument(skip(self, body), fields(base_url = %self.base_url))]
    pub async fn post<T, R>(&self, endpoint: &str, body: &T) -> CommonResult<Vec<R>>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self.body_request(HttpMethod::Post, endpoint, body)?;
        self.execute(request).await
    }

    /// PUT `body` as JSON to `base/endpoint` and decode a sequence of `R`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the body cannot be serialized, otherwise as
    /// [`Self::get`].
    #[instrument(skip(self, body), fields(base_url = %self.base_url))]
    pub async fn put<T, R>(&self, endpoint: &str, body: &T) -> CommonResult<Vec<R>>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self.body_request(HttpMethod::Put, endpoint, body)?;
        self.execute(request).await
    }

    fn body_request<T>(&self, method: HttpMethod, endpoint: &str, body: &T) -> CommonResult<OutboundRequest>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)
            .map_err(|e| CommonError::invalid_argument(format!("request body is not serializable: {e}")))?;
        Ok(OutboundRequest {
            method,
            url: self.endpoint_url(endpoint),
            body: Some(body),
        })
    }

    async fn execute<R>(&self, request: OutboundRequest) -> CommonResult<Vec<R>>
    where
        R: DeserializeOwned,
    {
        self.metrics.calls.inc();

        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(error) => {
                self.metrics.short_circuited.inc();
                self.metrics.failures.inc();
                warn!(method = request.method.as_str(), url = %request.url, "Call short-circuited");
                return Err(error);
            }
        };

        let result = self.retry.execute(|| self.attempt(&request)).await;

        match &result {
            Err(error) if error.is_transient() => permit.record_failure(),
            _ => permit.record_success(),
        }
        self.metrics.record_circuit_state(self.breaker.state());

        if let Err(error) = &result {
            self.metrics.failures.inc();
            debug!(method = request.method.as_str(), url = %request.url, error = %error, "Call failed");
        }
        result
    }

    async fn attempt<R>(&self, request: &OutboundRequest) -> CommonResult<Vec<R>>
    where
        R: DeserializeOwned,
    {
        self.metrics.attempts.inc();
        self.timeout
            .execute(async {
                let response = self.transport.send(request).await?;
                decode_response(response)
            })
            .await
    }
}

/// Decode a 2xx JSON array body; anything else is `RequestFailed`.
///
/// # Errors
///
/// Returns `RequestFailed` with the raw body for non-2xx statuses, or with
/// the decode fault for bodies that are not a JSON array of `R`.
pub fn decode_response<R>(response: RawResponse) -> CommonResult<Vec<R>>
where
    R: DeserializeOwned,
{
    if !response.is_success() {
        return Err(CommonError::request_failed(Some(response.status), response.body));
    }
    serde_json::from_str(&response.body).map_err(|e| {
        CommonError::request_failed(Some(response.status), format!("invalid response body: {e}"))
    })
}

fn metrics_prefix(base_url: &str) -> String {
    let host = url::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "client".to_string());
    host.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        name: String,
    }

    struct FixedTransport {
        response: RawResponse,
        seen: Mutex<Vec<OutboundRequest>>,
    }

    impl FixedTransport {
        fn new(status: u16, body: &str) -> Self {
            Self {
                response: RawResponse::new(status, body),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpTransport for FixedTransport {
        async fn send(&self, request: &OutboundRequest) -> CommonResult<RawResponse> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }
    }

    #[test]
    fn test_endpoint_url_is_stateless() {
        let client = ResilientClient::with_transport(
            "https://svc/",
            FixedTransport::new(200, "[]"),
            ResiliencePolicy::default(),
        );
        assert_eq!(client.endpoint_url("items"), "https://svc/items");
        assert_eq!(client.endpoint_url("/items"), "https://svc/items");
        assert_eq!(client.endpoint_url("items"), "https://svc/items");
        assert_eq!(client.base_url(), "https://svc");
    }

    #[test]
    fn test_decode_response() {
        let items: Vec<Item> = decode_response(RawResponse::new(200, r#"[{"name":"a"}]"#)).unwrap();
        assert_eq!(items, vec![Item { name: "a".to_string() }]);

        let empty: CommonResult<Vec<Item>> = decode_response(RawResponse::new(200, ""));
        assert!(matches!(empty, Err(CommonError::RequestFailed { status: Some(200), .. })));

        let missing: CommonResult<Vec<Item>> = decode_response(RawResponse::new(404, "not found"));
        assert!(matches!(
            missing,
            Err(CommonError::RequestFailed { status: Some(404), ref body }) if body == "not found"
        ));
    }

    #[tokio::test]
    async fn test_get_with_query_builds_url() {
        #[derive(Serialize)]
        struct Search {
            category: &'static str,
        }

        let client = ResilientClient::with_transport(
            "https://svc",
            FixedTransport::new(200, r#"[{"name":"rust book"}]"#),
            ResiliencePolicy::default(),
        );
        let items: Vec<Item> = client
            .get_with_query("items", &Search { category: "books" })
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        let seen = client.transport.seen.lock().unwrap();
        assert_eq!(seen[0].url, "https://svc/items?category=books");
        assert_eq!(seen[0].method, HttpMethod::Get);
    }

    #[tokio::test]
    async fn test_not_found_is_terminal() {
        let client = ResilientClient::with_transport(
            "https://svc",
            FixedTransport::new(404, "not found"),
            ResiliencePolicy::default(),
        );
        let result: CommonResult<Vec<Item>> = client.get("items").await;

        assert!(matches!(result, Err(CommonError::RequestFailed { ref body, .. }) if body == "not found"));
        assert_eq!(client.transport.seen.lock().unwrap().len(), 1);
        assert_eq!(client.circuit_state(), CircuitState::Closed);
        assert_eq!(client.metrics().failures.get(), 1);
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let client = ResilientClient::with_transport(
            "https://svc",
            FixedTransport::new(201, r#"[{"name":"created"}]"#),
            ResiliencePolicy::default(),
        );
        let body = serde_json::json!({ "name": "created" });
        let items: Vec<Item> = client.post("items", &body).await.unwrap();

        assert_eq!(items[0].name, "created");
        let seen = client.transport.seen.lock().unwrap();
        assert_eq!(seen[0].method, HttpMethod::Post);
        assert_eq!(seen[0].body.as_ref(), Some(&body));
        assert_eq!(seen[0].url, "https://svc/items");
    }

    #[test]
    fn test_metrics_prefix_from_host() {
        assert_eq!(metrics_prefix("https://inventory.svc:5000"), "inventory_svc");
        assert_eq!(metrics_prefix("not a url"), "client");
    }
}
