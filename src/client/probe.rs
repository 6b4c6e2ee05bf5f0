//! Authenticated probe client
//!
//! Issues boundary-value requests against the live API. Every request
//! waits on the shared [`RateLimiter`] first and feeds the response back
//! into it, so the limiter's adaptive ceiling reflects what the server
//! actually tolerates.
//!
//! Retry behavior: one attempt budget covers both throttling and
//! transport failures. A 429 sleeps for the limiter's backoff (or the
//! server's `Retry-After`, whichever is longer); a timeout or connection
//! error sleeps linearly on the attempt number. Any other response
//! returns immediately.

use reqwest::header::{self, HeaderMap};
use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::DriftConfig;
use crate::error::{DriftError, Result};
use crate::limiter::RateLimiter;

/// Probe client configuration.
#[derive(Debug, Clone)]
pub struct ProbeClientConfig {
    /// Base URL for the target API.
    pub base_url: String,
    /// Bearer token sent on every request.
    pub token: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Attempt budget shared by throttling and transport retries.
    pub max_retries: u32,
    /// Values substituted into `{param}` path placeholders.
    pub path_params: BTreeMap<String, String>,
}

impl Default for ProbeClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token: String::new(),
            timeout_ms: 30_000,
            max_retries: 3,
            path_params: BTreeMap::new(),
        }
    }
}

impl ProbeClientConfig {
    /// Build from the `api` config section plus the environment token.
    pub fn from_config(config: &DriftConfig, token: impl Into<String>) -> Self {
        Self {
            base_url: config.api.base_url.clone(),
            token: token.into(),
            timeout_ms: config.api.timeout_ms,
            max_retries: config.api.max_retries,
            path_params: config.api.path_params.clone(),
        }
    }
}

/// Validation signal extracted from a probe response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 2xx: the API accepted the value.
    Accepted,
    /// 400 or 422: the API rejected the value as invalid.
    Rejected,
    /// Any other status: no validation signal (auth failures, server
    /// errors, missing routes).
    Indeterminate(u16),
}

impl ProbeOutcome {
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_success() {
            ProbeOutcome::Accepted
        } else if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            ProbeOutcome::Rejected
        } else {
            ProbeOutcome::Indeterminate(status.as_u16())
        }
    }

    /// `Some(accepted)` for statuses that carry a validation signal.
    pub fn accepted(&self) -> Option<bool> {
        match self {
            ProbeOutcome::Accepted => Some(true),
            ProbeOutcome::Rejected => Some(false),
            ProbeOutcome::Indeterminate(_) => None,
        }
    }
}

/// Rate-limited, authenticated HTTP client.
pub struct ProbeClient {
    client: reqwest::Client,
    config: ProbeClientConfig,
    limiter: Arc<RateLimiter>,
}

impl ProbeClient {
    pub fn new(config: ProbeClientConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            limiter,
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Resolve `{param}` placeholders and join onto the base URL.
    fn url_for(&self, path: &str) -> String {
        let mut resolved = path.to_string();
        for (name, value) in &self.config.path_params {
            resolved = resolved.replace(&format!("{{{}}}", name), value);
        }
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            resolved.trim_start_matches('/')
        )
    }

    /// Send a request through the rate limiter with retries.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response> {
        let url = self.url_for(path);
        let mut last_error: Option<DriftError> = None;

        for attempt in 0..self.config.max_retries {
            self.limiter.wait_if_needed().await;

            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(
                    header::AUTHORIZATION,
                    format!("Bearer {}", self.config.token),
                )
                .header(header::ACCEPT, "application/json");
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    if response.status() == StatusCode::TOO_MANY_REQUESTS {
                        let mut backoff = self.limiter.record_rate_limit();
                        if let Some(retry_after) = parse_retry_after(response.headers()) {
                            backoff = backoff.max(retry_after);
                        }
                        warn!(
                            attempt = attempt + 1,
                            max_retries = self.config.max_retries,
                            backoff_secs = backoff.as_secs_f64(),
                            "rate limited, backing off"
                        );
                        sleep(backoff).await;
                        continue;
                    }

                    self.limiter.record_success();
                    return Ok(response);
                }
                Err(error) => {
                    // Linear backoff on transport failures, sharing the
                    // same attempt budget as 429 retries.
                    let backoff = self.limiter.config().initial_backoff * (attempt + 1);
                    if error.is_timeout() {
                        warn!(
                            attempt = attempt + 1,
                            max_retries = self.config.max_retries,
                            "request timed out"
                        );
                    } else {
                        warn!(
                            attempt = attempt + 1,
                            max_retries = self.config.max_retries,
                            %error,
                            "request failed"
                        );
                    }
                    last_error = Some(error.into());
                    sleep(backoff).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DriftError::http_error(format!(
                "request failed after {} attempts",
                self.config.max_retries
            ))
        }))
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Response> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// POST a probe body and map the response status to an outcome.
    pub async fn probe(&self, path: &str, body: &Value) -> Result<ProbeOutcome> {
        let response = self.post(path, body).await?;
        let outcome = ProbeOutcome::from_status(response.status());
        debug!(
            status = response.status().as_u16(),
            outcome = ?outcome,
            "probe complete"
        );
        Ok(outcome)
    }

    /// Lightweight connectivity and auth check against the API root.
    pub async fn test_connection(&self) -> bool {
        match self.get("/").await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    debug!("API connection successful");
                    true
                } else {
                    warn!(status = status.as_u16(), "API connection check failed");
                    false
                }
            }
            Err(error) => {
                warn!(%error, "API connection check failed");
                false
            }
        }
    }
}

/// Numeric `Retry-After` header, if present and parseable.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(header::RETRY_AFTER)?.to_str().ok()?;
    let secs: f64 = value.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::RateLimitConfig;
    use serde_json::json;
    use wiremock::matchers::{header as header_matcher, method as method_matcher, path as path_matcher};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_limiter() -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(RateLimitConfig {
            min_request_interval: Duration::from_millis(0),
            initial_backoff: Duration::from_millis(10),
            ..RateLimitConfig::default()
        }))
    }

    fn client_for(server: &MockServer) -> ProbeClient {
        let config = ProbeClientConfig {
            base_url: server.uri(),
            token: "token123".to_string(),
            timeout_ms: 5_000,
            max_retries: 3,
            path_params: BTreeMap::from([("namespace".to_string(), "prod".to_string())]),
        };
        ProbeClient::new(config, fast_limiter()).unwrap()
    }

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(
            ProbeOutcome::from_status(StatusCode::OK),
            ProbeOutcome::Accepted
        );
        assert_eq!(
            ProbeOutcome::from_status(StatusCode::CREATED),
            ProbeOutcome::Accepted
        );
        assert_eq!(
            ProbeOutcome::from_status(StatusCode::BAD_REQUEST),
            ProbeOutcome::Rejected
        );
        assert_eq!(
            ProbeOutcome::from_status(StatusCode::UNPROCESSABLE_ENTITY),
            ProbeOutcome::Rejected
        );
        assert_eq!(
            ProbeOutcome::from_status(StatusCode::INTERNAL_SERVER_ERROR),
            ProbeOutcome::Indeterminate(500)
        );
        assert_eq!(ProbeOutcome::Accepted.accepted(), Some(true));
        assert_eq!(ProbeOutcome::Rejected.accepted(), Some(false));
        assert_eq!(ProbeOutcome::Indeterminate(503).accepted(), None);
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(header::RETRY_AFTER, "2".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(2)));

        headers.insert(header::RETRY_AFTER, "1.5".parse().unwrap());
        assert_eq!(
            parse_retry_after(&headers),
            Some(Duration::from_secs_f64(1.5))
        );

        headers.insert(
            header::RETRY_AFTER,
            "Wed, 21 Oct 2026 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(parse_retry_after(&headers), None);

        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_probe_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method_matcher("POST"))
            .and(path_matcher("/api/v1/users"))
            .and(header_matcher("Authorization", "Bearer token123"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let outcome = client
            .probe("/api/v1/users", &json!({"name": "probe"}))
            .await
            .unwrap();
        assert_eq!(outcome, ProbeOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_path_params_are_substituted() {
        let server = MockServer::start().await;
        Mock::given(method_matcher("POST"))
            .and(path_matcher("/api/v1/namespaces/prod/users"))
            .respond_with(ResponseTemplate::new(422))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let outcome = client
            .probe("/api/v1/namespaces/{namespace}/users", &json!({}))
            .await
            .unwrap();
        assert_eq!(outcome, ProbeOutcome::Rejected);
    }

    #[tokio::test]
    async fn test_rate_limited_request_retries_and_recovers() {
        let server = MockServer::start().await;
        Mock::given(method_matcher("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method_matcher("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let outcome = client.probe("/api/v1/users", &json!({})).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::Accepted);

        // The 429 left its mark on the limiter.
        assert!(client.limiter().stats().current_rpm < 30.0);
    }

    #[tokio::test]
    async fn test_retry_after_header_outranks_limiter_backoff() {
        let server = MockServer::start().await;
        Mock::given(method_matcher("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method_matcher("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let started = std::time::Instant::now();
        let outcome = client.probe("/api/v1/users", &json!({})).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::Accepted);

        // The limiter's own backoff is 10ms; the server's Retry-After of
        // one second must win before the retry is sent.
        assert!(started.elapsed() >= Duration::from_millis(950));
    }

    #[tokio::test]
    async fn test_exhausted_attempts_return_error() {
        let server = MockServer::start().await;
        Mock::given(method_matcher("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let error = client.probe("/api/v1/users", &json!({})).await.unwrap_err();
        assert!(matches!(error, DriftError::HttpError(_)));
        assert!(error.to_string().contains("attempts"));
    }

    #[tokio::test]
    async fn test_non_validation_status_returns_immediately() {
        let server = MockServer::start().await;
        Mock::given(method_matcher("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let outcome = client.probe("/api/v1/users", &json!({})).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::Indeterminate(500));
    }

    #[tokio::test]
    async fn test_connection_check() {
        let server = MockServer::start().await;
        Mock::given(method_matcher("GET"))
            .and(path_matcher("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.test_connection().await);
    }
}
