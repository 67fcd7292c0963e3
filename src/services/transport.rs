//! CoinMarketCap API Transport
//!
//! Rate-limited HTTP client for the CoinMarketCap professional API
//! (https://pro-api.coinmarketcap.com/v1).
//!
//! Features:
//! - One pooled `reqwest::Client` per instance, released by `close()`
//! - Exponential backoff retry on 429/5xx, timeouts and connection failures
//!   (max 5 attempts, delays doubling from 1s)
//! - Validation of the `{status: {error_code, ...}}` envelope inside 200 responses
//! - Monotonic call counter for checking consumption against the daily quota
//!   (333 calls/day on the free plan). The counter is informational: the
//!   transport never refuses a call.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut client = CoinMarketCapClient::new(&config)?;
//! let quotes = client.quotes_latest(&["BTC".to_string()], "USD").await?;
//! println!("{} calls so far", client.request_count());
//! client.close();
//! ```

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::constants::{
    API_KEY_HEADER, BASE_RETRY_DELAY_MS, GLOBAL_METRICS_ENDPOINT, MAX_ATTEMPTS,
    MAX_RETRY_DELAY_SECS, QUOTES_LATEST_ENDPOINT, RETRYABLE_STATUSES,
};
use crate::models::api::{ApiEnvelope, GlobalMetricsData};
use crate::models::CollectorConfig;
use crate::utils::body_preview;

/// Transport-level failures
#[derive(ThisError, Debug)]
pub enum TransportError {
    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    /// Body was not the JSON envelope we expect
    #[error("Invalid JSON response: {0}")]
    Decode(String),

    /// Non-zero `status.error_code` inside an HTTP 200
    #[error("CoinMarketCap API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        status: Option<u16>,
        body: Option<String>,
        last: String,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Transport is closed")]
    Closed,
}

impl TransportError {
    /// Transient conditions worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Status { status, .. } => RETRYABLE_STATUSES.contains(status),
            TransportError::Timeout(_) | TransportError::Connection(_) => true,
            _ => false,
        }
    }

    /// HTTP status attached to the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::RetriesExhausted { status, .. } => *status,
            _ => None,
        }
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else {
            TransportError::Connection(e.to_string())
        }
    }
}

/// Conditions inside a successful envelope that are tolerated but logged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeGap {
    /// No `status` block at all
    MissingStatus,
    /// `status` present without `error_code`; treated as success
    MissingErrorCode,
}

/// Backoff schedule for transient failures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: Duration::from_millis(BASE_RETRY_DELAY_MS),
            max_delay: Duration::from_secs(MAX_RETRY_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    /// Delay before the `retry`-th retry (1-based): base, 2x base, 4x base, ...
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn jittered(&self, retry: u32) -> Duration {
        let delay = self.delay_for(retry);
        delay.mul_f64(1.0 + rand::random::<f64>() * 0.1).min(self.max_delay)
    }
}

/// Validate the status envelope of a 200 response
pub fn check_envelope(envelope: &ApiEnvelope) -> Result<Option<EnvelopeGap>, TransportError> {
    let Some(status) = envelope.status.as_ref() else {
        return Ok(Some(EnvelopeGap::MissingStatus));
    };

    match status.error_code {
        None => Ok(Some(EnvelopeGap::MissingErrorCode)),
        Some(0) => Ok(None),
        Some(code) => Err(TransportError::Api {
            code,
            message: status
                .error_message
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string()),
        }),
    }
}

/// CoinMarketCap client with retry and call counting
pub struct CoinMarketCapClient {
    client: Option<Client>,
    base_url: String,
    retry: RetryPolicy,
    request_count: u64,
}

impl CoinMarketCapClient {
    /// Create a client from the collector configuration
    pub fn new(config: &CollectorConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        let name = HeaderName::from_bytes(API_KEY_HEADER.as_bytes())
            .map_err(|e| TransportError::Client(e.to_string()))?;
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| TransportError::Client(format!("Invalid API key header: {}", e)))?;
        headers.insert(name, key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        debug!(base_url = %config.base_url, "Created CoinMarketCap client");

        Ok(Self {
            client: Some(client),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
            request_count: 0,
        })
    }

    /// Override the retry schedule (tests use millisecond delays)
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// HTTP attempts made by this instance, retries included
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Release pooled connections. Safe to call more than once.
    pub fn close(&mut self) {
        if self.client.take().is_some() {
            debug!(requests = self.request_count, "Closed CoinMarketCap client");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_none()
    }

    /// GET `endpoint` with retry; returns the validated envelope
    pub async fn execute(
        &mut self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<ApiEnvelope, TransportError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        info!(endpoint = endpoint, "Starting API request");

        let mut attempt = 0;
        loop {
            attempt += 1;

            let err = match self.send_once(&url, params).await {
                Ok(envelope) => return Ok(envelope),
                Err(e) => e,
            };

            if !err.is_retryable() {
                log_failure(&err);
                return Err(err);
            }

            if attempt >= self.retry.max_attempts {
                log_failure(&err);
                let (status, body) = match &err {
                    TransportError::Status { status, body } => (Some(*status), Some(body.clone())),
                    _ => (None, None),
                };
                return Err(TransportError::RetriesExhausted {
                    attempts: attempt,
                    status,
                    body,
                    last: err.to_string(),
                });
            }

            let delay = self.retry.jittered(attempt);
            warn!(
                endpoint = endpoint,
                error = %err,
                "API retry backoff: attempt {}/{}, waiting {:.1}s",
                attempt + 1,
                self.retry.max_attempts,
                delay.as_secs_f64()
            );
            sleep(delay).await;
        }
    }

    /// One HTTP attempt. Always counts against the quota counter.
    async fn send_once(
        &mut self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<ApiEnvelope, TransportError> {
        let client = self.client.as_ref().ok_or(TransportError::Closed)?;
        self.request_count += 1;

        let response = client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        let body = response.text().await.map_err(TransportError::from_reqwest)?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: body_preview(&body),
            });
        }

        let envelope: ApiEnvelope = serde_json::from_str(&body).map_err(|e| {
            warn!(response = %body_preview(&body), "Failed to decode response body");
            TransportError::Decode(e.to_string())
        })?;

        if let Some(gap) = check_envelope(&envelope)? {
            warn!(gap = ?gap, "Response status envelope incomplete; treating as success");
        }

        let credits = envelope
            .status
            .as_ref()
            .and_then(|s| s.credit_count)
            .unwrap_or(0);
        info!(
            credits = credits,
            total_requests = self.request_count,
            "Request succeeded"
        );

        Ok(envelope)
    }

    /// Latest quotes for `symbols` in one settlement currency.
    ///
    /// Returns the raw `data` object keyed by symbol; entries are decoded by
    /// the merge step so one malformed asset cannot fail the batch.
    pub async fn quotes_latest(
        &mut self,
        symbols: &[String],
        currency: &str,
    ) -> Result<Map<String, Value>, TransportError> {
        let joined = symbols.join(",");
        let envelope = self
            .execute(QUOTES_LATEST_ENDPOINT, &[("symbol", &joined), ("convert", currency)])
            .await?;

        match envelope.data {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(TransportError::Decode(format!(
                "expected object in quotes data, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Global market metrics in one settlement currency
    pub async fn global_metrics_latest(
        &mut self,
        currency: &str,
    ) -> Result<GlobalMetricsData, TransportError> {
        let envelope = self
            .execute(GLOBAL_METRICS_ENDPOINT, &[("convert", currency)])
            .await?;

        serde_json::from_value(envelope.data).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

impl Drop for CoinMarketCapClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn log_failure(err: &TransportError) {
    match err.status() {
        Some(401) => error!("Invalid API key. Check COINMARKETCAP_API_KEY"),
        Some(429) => error!("Rate limit exceeded. The daily/monthly quota may be exhausted"),
        _ => {}
    }

    match err {
        TransportError::Status { status, body } => {
            error!(status = status, body = %body, "HTTP error from API");
        }
        TransportError::RetriesExhausted { body: Some(body), .. } => {
            error!(error = %err, body = %body, "API request failed");
        }
        _ => error!(error = %err, "API request failed"),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{StubResponse, StubServer};
    use crate::models::api::ApiStatus;

    fn test_config(base_url: &str) -> CollectorConfig {
        CollectorConfig {
            api_key: "test-key".to_string(),
            base_url: base_url.to_string(),
            request_timeout: Duration::from_millis(300),
            ..Default::default()
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        }
    }

    const OK_BODY: &str = r#"{"status": {"error_code": 0, "credit_count": 1}, "data": {"BTC": {"name": "Bitcoin"}}}"#;

    #[test]
    fn test_retry_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(10), Duration::from_secs(60));
    }

    #[test]
    fn test_retryable_classification() {
        for status in [429, 500, 502, 503, 504] {
            let e = TransportError::Status { status, body: String::new() };
            assert!(e.is_retryable(), "{} should be retryable", status);
        }
        for status in [400, 401, 403, 404] {
            let e = TransportError::Status { status, body: String::new() };
            assert!(!e.is_retryable(), "{} should not be retryable", status);
        }
        assert!(TransportError::Timeout("t".into()).is_retryable());
        assert!(!TransportError::Decode("d".into()).is_retryable());
        assert!(!TransportError::Api { code: 400, message: "bad".into() }.is_retryable());
    }

    #[test]
    fn test_check_envelope() {
        let ok = ApiEnvelope {
            status: Some(ApiStatus { error_code: Some(0), ..Default::default() }),
            data: Value::Null,
        };
        assert_eq!(check_envelope(&ok).unwrap(), None);

        let gap = ApiEnvelope {
            status: Some(ApiStatus::default()),
            data: Value::Null,
        };
        assert_eq!(check_envelope(&gap).unwrap(), Some(EnvelopeGap::MissingErrorCode));

        let failed = ApiEnvelope {
            status: Some(ApiStatus {
                error_code: Some(400),
                error_message: Some("Invalid value for \"symbol\"".to_string()),
                ..Default::default()
            }),
            data: Value::Null,
        };
        assert!(matches!(check_envelope(&failed), Err(TransportError::Api { code: 400, .. })));
    }

    #[tokio::test]
    async fn test_retries_429_then_succeeds() {
        let server = StubServer::start(|hit, _| {
            if hit < 3 {
                StubResponse::status(429, r#"{"status": {"error_code": 1008}}"#)
            } else {
                StubResponse::ok(OK_BODY)
            }
        })
        .await;

        let mut client = CoinMarketCapClient::new(&test_config(&server.base_url))
            .unwrap()
            .with_retry_policy(fast_retry());

        let data = client.quotes_latest(&["BTC".to_string()], "USD").await.unwrap();
        assert!(data.contains_key("BTC"));
        assert_eq!(client.request_count(), 4);
        assert_eq!(server.hits(), 4);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let server = StubServer::start(|_, _| StubResponse::status(503, "maintenance")).await;

        let mut client = CoinMarketCapClient::new(&test_config(&server.base_url))
            .unwrap()
            .with_retry_policy(fast_retry());

        let err = client.quotes_latest(&["BTC".to_string()], "USD").await.unwrap_err();
        match err {
            TransportError::RetriesExhausted { attempts, status, body, .. } => {
                assert_eq!(attempts, 5);
                assert_eq!(status, Some(503));
                assert_eq!(body.as_deref(), Some("maintenance"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(client.request_count(), 5);
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let server = StubServer::start(|_, _| {
            StubResponse::status(401, r#"{"status": {"error_code": 1001, "error_message": "This API Key is invalid."}}"#)
        })
        .await;

        let mut client = CoinMarketCapClient::new(&test_config(&server.base_url))
            .unwrap()
            .with_retry_policy(fast_retry());

        let err = client.global_metrics_latest("USD").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(matches!(err, TransportError::Status { .. }));
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn test_logical_api_error_is_not_retried() {
        let server = StubServer::start(|_, _| {
            StubResponse::ok(r#"{"status": {"error_code": 400, "error_message": "Invalid value for \"convert\""}, "data": null}"#)
        })
        .await;

        let mut client = CoinMarketCapClient::new(&test_config(&server.base_url))
            .unwrap()
            .with_retry_policy(fast_retry());

        let err = client.quotes_latest(&["BTC".to_string()], "XXX").await.unwrap_err();
        assert!(matches!(err, TransportError::Api { code: 400, .. }));
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_json_is_not_retried() {
        let server = StubServer::start(|_, _| StubResponse::ok("<html>oops</html>")).await;

        let mut client = CoinMarketCapClient::new(&test_config(&server.base_url))
            .unwrap()
            .with_retry_policy(fast_retry());

        let err = client.global_metrics_latest("USD").await.unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let server = StubServer::start(|hit, _| {
            if hit == 0 {
                StubResponse::hang()
            } else {
                StubResponse::ok(r#"{"status": {"error_code": 0}, "data": {"btc_dominance": 55.0, "quote": {}}}"#)
            }
        })
        .await;

        let mut client = CoinMarketCapClient::new(&test_config(&server.base_url))
            .unwrap()
            .with_retry_policy(fast_retry());

        let data = client.global_metrics_latest("USD").await.unwrap();
        assert_eq!(data.btc_dominance, Some(55.0));
        assert_eq!(client.request_count(), 2);
    }

    #[tokio::test]
    async fn test_sends_key_and_query() {
        let server = StubServer::start(|_, _| StubResponse::ok(OK_BODY)).await;

        let mut client = CoinMarketCapClient::new(&test_config(&server.base_url)).unwrap();
        client
            .quotes_latest(&["BTC".to_string(), "ETH".to_string()], "BRL")
            .await
            .unwrap();

        let request = server.requests().pop().unwrap();
        assert!(request.target.starts_with("/cryptocurrency/quotes/latest?"));
        assert!(request.target.contains("symbol=BTC%2CETH"));
        assert!(request.target.contains("convert=BRL"));
        assert_eq!(request.header(API_KEY_HEADER).as_deref(), Some("test-key"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut client = CoinMarketCapClient::new(&test_config("http://127.0.0.1:9")).unwrap();
        client.close();
        client.close();
        assert!(client.is_closed());

        let err = client.global_metrics_latest("USD").await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
        assert_eq!(client.request_count(), 0);
    }
}
