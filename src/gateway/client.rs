//! HTTP client for the surveillance API

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Method, Response};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::{ClientError, ErrorKind};
use super::query::encode_query;

/// Public gateway for the 4Wings fishing effort reports
pub const DEFAULT_BASE_URL: &str = "https://gateway.api.globalfishingwatch.org/v3";

// ============================================================================
// Secret
// ============================================================================

/// API token that never prints itself
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw token, only for building the Authorization header
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Retry budget and delays
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Base for rate-limit backoff, doubled per retry already spent
    pub rate_limit_base_delay: Duration,
    /// Fixed delay after a gateway or client timeout
    pub timeout_retry_delay: Duration,
    /// Upper bound on a server-provided `Retry-After`
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_base_delay: Duration::from_secs(5),
            timeout_retry_delay: Duration::from_secs(2),
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after a 429.
    ///
    /// A server-provided `Retry-After` wins over the computed backoff, up to
    /// `max_retry_after`.
    pub fn rate_limit_delay(&self, retries_spent: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(wait) => wait.min(self.max_retry_after),
            None => self.rate_limit_base_delay * 2u32.saturating_pow(retries_spent),
        }
    }
}

/// Configuration for [`GatewayClient`]
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Bearer token; `None` means the client is not configured
    pub token: Option<Secret>,
    /// Hard timeout for each physical call
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

// ============================================================================
// Sleeper
// ============================================================================

/// Waits between retry attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ============================================================================
// Client
// ============================================================================

/// Authenticated, retrying client for the surveillance API.
///
/// The provider is a shared, low-concurrency resource: callers are expected to
/// consolidate requests (one grouped report per region) rather than fan out.
pub struct GatewayClient {
    config: GatewayConfig,
    http: Client,
    sleeper: Arc<dyn Sleeper>,
}

impl GatewayClient {
    /// Create a client; fails only if the TLS backend cannot initialize
    pub fn new(config: GatewayConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("ocean-pulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::generic(format!("failed to build HTTP client: {}", e)))?;

        debug!(
            base_url = %config.base_url,
            configured = config.token.as_ref().is_some_and(|t| !t.is_blank()),
            timeout_ms = config.timeout.as_millis() as u64,
            max_retries = config.retry.max_retries,
            "GatewayClient created"
        );

        Ok(Self {
            config,
            http,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the retry sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Capability probe: true when a non-blank token is present
    pub fn is_configured(&self) -> bool {
        self.config.token.as_ref().is_some_and(|t| !t.is_blank())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn endpoint_url(&self, endpoint: &str, query: &[(String, String)]) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = endpoint.trim_start_matches('/');
        if query.is_empty() {
            format!("{}/{}", base, path)
        } else {
            format!("{}/{}?{}", base, path, encode_query(query))
        }
    }

    /// Perform a call and decode the JSON response.
    ///
    /// Retries 429 and timeouts up to the configured budget; any other
    /// failure is returned immediately.
    pub async fn request(
        &self,
        endpoint: &str,
        method: Method,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let token = match self.config.token.as_ref() {
            Some(token) if !token.is_blank() => token,
            _ => return Err(ClientError::not_configured()),
        };

        let url = self.endpoint_url(endpoint, query);
        let policy = &self.config.retry;
        let mut retries_spent = 0u32;

        loop {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(token.expose())
                .header(header::ACCEPT, "application/json");
            if let Some(body) = body {
                request = request.json(body);
            }

            let (error, retry_after) = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    return decode_success(response).await;
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let retry_after = parse_retry_after(response.headers());
                    let raw_body = response.text().await.unwrap_or_default();
                    (ClientError::from_status(status, raw_body), retry_after)
                }
                Err(e) if e.is_timeout() => (ClientError::timeout(e.to_string()), None),
                Err(e) => (ClientError::transport(e.to_string()), None),
            };

            let delay = match error.kind {
                ErrorKind::RateLimited => policy.rate_limit_delay(retries_spent, retry_after),
                ErrorKind::Timeout => policy.timeout_retry_delay,
                _ => {
                    debug!(
                        endpoint = %endpoint,
                        status = ?error.status,
                        kind = %error.kind,
                        "Non-retryable gateway failure"
                    );
                    return Err(error);
                }
            };

            if retries_spent >= policy.max_retries {
                warn!(
                    endpoint = %endpoint,
                    kind = %error.kind,
                    attempts = retries_spent + 1,
                    "Retry budget exhausted"
                );
                return Err(error.exhausted());
            }

            warn!(
                endpoint = %endpoint,
                status = ?error.status,
                kind = %error.kind,
                attempt = retries_spent + 1,
                max_attempts = policy.max_retries + 1,
                backoff_ms = delay.as_millis() as u64,
                "Transient gateway failure, backing off"
            );
            self.sleeper.sleep(delay).await;
            retries_spent += 1;
        }
    }
}

impl fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn decode_success(response: Response) -> Result<Value, ClientError> {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| ClientError::decode(Some(status), e.to_string()))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| ClientError::decode(Some(status), e.to_string()))
}

/// Parse `Retry-After` as delta-seconds or an HTTP date
fn parse_retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    let value = headers.get(header::RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let wait = at.signed_duration_since(Utc::now()).to_std().unwrap_or(Duration::ZERO);
    Some(wait)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_rate_limit_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_delay(0, None), Duration::from_millis(5000));
        assert_eq!(policy.rate_limit_delay(1, None), Duration::from_millis(10000));
        assert_eq!(policy.rate_limit_delay(2, None), Duration::from_millis(20000));
        assert_eq!(
            policy.rate_limit_delay(2, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
    }

    #[test]
    fn test_retry_after_is_clamped() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.rate_limit_delay(0, Some(Duration::from_secs(86_400))),
            Duration::from_secs(60)
        );

        let strict = RetryPolicy {
            max_retry_after: Duration::from_secs(3),
            ..Default::default()
        };
        assert_eq!(strict.rate_limit_delay(1, Some(Duration::from_secs(7))), Duration::from_secs(3));
    }

    #[test]
    fn test_retry_after_parsing() {
        let mut headers = header::HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(header::RETRY_AFTER, header::HeaderValue::from_static("12"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));

        headers.insert(
            header::RETRY_AFTER,
            header::HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), Some(Duration::ZERO));

        headers.insert(header::RETRY_AFTER, header::HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("super-secret-token");
        assert_eq!(format!("{:?}", secret), "Secret(***)");
        assert_eq!(format!("{}", secret), "***");

        let config = GatewayConfig {
            token: Some(secret),
            ..Default::default()
        };
        assert!(!format!("{:?}", config).contains("super-secret-token"));
    }

    #[test]
    fn test_capability_probe() {
        let unconfigured = GatewayClient::new(GatewayConfig::default()).unwrap();
        assert!(!unconfigured.is_configured());

        let blank = GatewayClient::new(GatewayConfig {
            token: Some(Secret::new("   ")),
            ..Default::default()
        })
        .unwrap();
        assert!(!blank.is_configured());

        let configured = GatewayClient::new(GatewayConfig {
            token: Some(Secret::new("token")),
            ..Default::default()
        })
        .unwrap();
        assert!(configured.is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_request_short_circuits() {
        let client = GatewayClient::new(GatewayConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        })
        .unwrap();
        let err = client
            .request("/4wings/report", Method::POST, &[], None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotConfigured);
        assert_eq!(err.status, None);
    }

    #[test]
    fn test_endpoint_url_joins_query() {
        let client = GatewayClient::new(GatewayConfig {
            base_url: "https://example.org/v3/".to_string(),
            ..Default::default()
        })
        .unwrap();
        let url = client.endpoint_url(
            "/4wings/report",
            &[("datasets[0]".to_string(), "effort:latest".to_string())],
        );
        assert_eq!(url, "https://example.org/v3/4wings/report?datasets[0]=effort%3Alatest");
    }
}
