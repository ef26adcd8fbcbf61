//! REST client implementation
//!
//! This module implements the JSON-over-HTTP calls made against the support
//! backend. It provides request/response types, error handling, retry helpers
//! and the core HTTP client.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// Error Types
// =============================================================================

/// REST error with HTTP status and message
///
/// Covers both transport failures (status `0`) and error responses returned
/// by the backend.
///
/// # Examples
/// ```
/// use support_client::rest::RestError;
///
/// let error = RestError::new(404, "NotFound", "Conversation not found");
/// assert_eq!(error.status(), 404);
/// assert!(!error.is_network_error());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestError {
    /// HTTP status code (0 when no response was received)
    status: u16,
    /// Error code (e.g., "NotFound", "NetworkError")
    code: String,
    /// Human-readable error message
    message: String,
}

impl RestError {
    /// Create a new REST error
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Get the HTTP status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Get the error code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if this is a network-related error that should be retried
    ///
    /// Status 0 is used for requests that never produced a response.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self.status,
            0 | 408 | 425 | 429 | 500 | 502 | 503 | 504 | 522 | 524
        )
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        self.is_network_error()
    }
}

impl std::fmt::Display for RestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "REST error {}: {} - {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for RestError {}

// =============================================================================
// Request Types
// =============================================================================

/// HTTP method for REST requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request
    Get,
    /// PATCH request
    Patch,
}

impl HttpMethod {
    /// Method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Patch => "PATCH",
        }
    }
}

/// A request against a backend path
///
/// Query parameters keep their insertion order so request URLs are stable.
#[derive(Debug, Clone)]
pub struct RestRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Path relative to the base URL (e.g., "/conversations")
    pub path: String,
    /// Query parameters
    pub params: Vec<(String, String)>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body
    pub body: Option<Vec<u8>>,
    /// Content type of the body
    pub encoding: Option<String>,
}

impl RestRequest {
    fn with_method(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            headers: HashMap::new(),
            body: None,
            encoding: None,
        }
    }

    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::with_method(HttpMethod::Get, path)
    }

    /// Create a PATCH request
    pub fn patch(path: impl Into<String>) -> Self {
        Self::with_method(HttpMethod::Patch, path)
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the request body from JSON
    pub fn json_body<T: Serialize>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        self.body = Some(body);
        self.encoding = Some("application/json".to_string());
        Ok(self)
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Decoded response with status and headers
#[derive(Debug, Clone)]
pub struct RestResponse<T> {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response data
    pub data: T,
}

impl<T> RestResponse<T> {
    /// Create a new response
    pub fn new(status: u16, headers: HashMap<String, String>, data: T) -> Self {
        Self {
            status,
            headers,
            data,
        }
    }

    /// Get a header value
    pub fn header(&self, key: &str) -> Option<&String> {
        self.headers.get(key)
    }

    /// Check if the response is successful (2xx status)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Error body shapes the backend may return
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RestErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default, alias = "detail")]
    message: Option<String>,
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the REST client
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    /// Base URL of the support backend (e.g., "https://support.example.com/api")
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Headers included in every request
    pub default_headers: HashMap<String, String>,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("Support-Console/{}", env!("CARGO_PKG_VERSION")),
            default_headers: HashMap::new(),
        }
    }
}

impl RestClientConfig {
    /// Create a new config with a base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a default header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }

    /// Attach a bearer token to every request
    pub fn with_bearer_token(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.with_header("Authorization", value)
    }
}

// =============================================================================
// Retry Logic with Exponential Backoff
// =============================================================================

use std::future::Future;
use tokio::time::sleep;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: usize,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Set the initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(delay_ms as u64).min(self.max_delay)
    }
}

/// Retry an async operation while `should_retry` accepts the error
pub async fn retry<F, Fut, T, E>(
    config: RetryConfig,
    should_retry: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempts = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !should_retry(&err) || attempts >= config.max_retries {
                    return Err(err);
                }

                let delay = config.delay_for(attempts);
                attempts += 1;
                tracing::debug!(attempt = attempts, ?delay, "retrying request");
                sleep(delay).await;
            }
        }
    }
}

/// Retry network-class failures up to `max_retries` times
pub async fn network_retry<F, Fut, T>(max_retries: usize, operation: F) -> Result<T, RestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RestError>>,
{
    retry(
        RetryConfig::new(max_retries),
        |err: &RestError| err.is_network_error(),
        operation,
    )
    .await
}

// =============================================================================
// Client Implementation
// =============================================================================

use reqwest::{Client as ReqwestClient, Response as ReqwestResponse};

/// HTTP client for the support backend
///
/// # Examples
/// ```
/// use support_client::rest::{RestClient, RestClientConfig, RestRequest};
///
/// async fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let client = RestClient::new(RestClientConfig::new("https://support.example.com"))?;
///
///     let request = RestRequest::get("/conversations").param("skip", 0).param("limit", 20);
///     let response = client.send::<serde_json::Value>(request).await?;
///     println!("status {}", response.status);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RestClient {
    client: ReqwestClient,
    config: RestClientConfig,
}

impl RestClient {
    /// Create a new REST client
    pub fn new(config: RestClientConfig) -> Result<Self, RestError> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| RestError::new(0, "ClientBuild", e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Send a request and decode the JSON response body
    pub async fn send<T>(&self, request: RestRequest) -> Result<RestResponse<T>, RestError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );

        let mut req = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Patch => self.client.patch(&url),
        };

        if !request.params.is_empty() {
            req = req.query(&request.params);
        }

        for (key, value) in &self.config.default_headers {
            req = req.header(key, value);
        }

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body {
            if let Some(encoding) = &request.encoding {
                req = req.header("Content-Type", encoding);
            }
            req = req.body(body);
        }

        let response = req.send().await.map_err(|e| {
            RestError::new(0, "NetworkError", format!("Request failed: {}", e))
        })?;

        self.parse_response(response).await
    }

    /// Send a request, retrying network-class failures
    pub async fn send_with_retry<T>(
        &self,
        request: RestRequest,
        max_retries: usize,
    ) -> Result<RestResponse<T>, RestError>
    where
        T: for<'de> Deserialize<'de>,
    {
        network_retry(max_retries, || self.send(request.clone())).await
    }

    async fn parse_response<T>(&self, response: ReqwestResponse) -> Result<RestResponse<T>, RestError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(value_str) = value.to_str() {
                headers.insert(key.to_string(), value_str.to_string());
            }
        }

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<RestErrorBody>(&error_body).unwrap_or_default();

            return Err(RestError::new(
                status,
                parsed.error.unwrap_or_else(|| "Unknown".to_string()),
                parsed
                    .message
                    .unwrap_or_else(|| format!("HTTP {}: {}", status, error_body)),
            ));
        }

        let body = response.text().await.map_err(|e| {
            RestError::new(0, "ParseError", format!("Failed to read response: {}", e))
        })?;

        let data: T = serde_json::from_str(&body).map_err(|e| {
            RestError::new(status, "ParseError", format!("Failed to parse JSON: {}", e))
        })?;

        Ok(RestResponse::new(status, headers, data))
    }

    /// Get the client configuration
    pub fn config(&self) -> &RestClientConfig {
        &self.config
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }
}

// =============================================================================
// Tests
// =============================================================================
