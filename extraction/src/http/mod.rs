//! HTTP Fetcher (C1): plain GET/HEAD with retry, redirect tracking, and the
//! shared SSRF validator. One connection-pooling client per process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::error::{FetchError, FetchResult};
use crate::retry::{retry_with_backoff, BackoffPolicy};
use crate::security::UrlValidator;

/// The page-fetching capability `extract` and `discovery` depend on,
/// separated from `HttpFetcher` so tests can substitute a fake.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult<FetchResponse>;
}

/// Outcome of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub final_url: String,
    pub elapsed: Duration,
}

impl FetchResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

static TLS_WARNING_LOGGED: AtomicBool = AtomicBool::new(false);

/// Options for a single fetch call.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: reqwest::Method,
    pub timeout: Duration,
    pub headers: HashMap<String, String>,
    pub max_bytes: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: reqwest::Method::GET,
            timeout: Duration::from_secs(15),
            headers: HashMap::new(),
            max_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Shared, connection-pooling HTTP client used by discovery, selection
/// fallback fetches, and anything else that doesn't need JS rendering.
pub struct HttpFetcher {
    client: reqwest::Client,
    config: HttpConfig,
    validator: UrlValidator,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig) -> Self {
        if !config.strict_tls && !TLS_WARNING_LOGGED.swap(true, Ordering::SeqCst) {
            warn!("TLS certificate verification is disabled (http.strict_tls=false)");
        }

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.strict_tls)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_s))
            .build()
            .expect("failed to build reqwest client");

        Self { client, config, validator: UrlValidator::new() }
    }

    pub fn with_validator(mut self, validator: UrlValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Fetch a URL with the configured retry policy applied to retryable
    /// error kinds.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult<FetchResponse> {
        self.validator
            .validate_with_dns(url)
            .await
            .map_err(|e| FetchError::Malformed { url: url.to_string(), reason: e.to_string() })?;

        let policy = BackoffPolicy::new(self.config.max_retries);
        retry_with_backoff(
            policy,
            rand_fraction,
            FetchError::retryable,
            || self.fetch_once(url, options),
        )
        .await
    }

    async fn fetch_once(&self, url: &str, options: &FetchOptions) -> FetchResult<FetchResponse> {
        let start = Instant::now();
        debug!(url, "fetching");

        let mut builder = self
            .client
            .request(options.method.clone(), url)
            .header("User-Agent", &self.config.user_agent);

        for (key, value) in &options.headers {
            builder = builder.header(key, value);
        }

        let response = builder.send().await.map_err(|e| classify_transport_error(url, e))?;

        let status = response.status();
        let final_url = response.url().to_string();

        if status.as_u16() == 429 {
            if let Some(retry_after) = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|s| *s <= 30)
            {
                tokio::time::sleep(Duration::from_secs(retry_after)).await;
            }
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus { url: url.to_string(), status: status.as_u16() });
        }

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();

        let max_bytes = options.max_bytes;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_transport_error(url, e))?;

        if bytes.len() > max_bytes {
            return Err(FetchError::TooLarge { url: url.to_string(), max_bytes });
        }

        Ok(FetchResponse {
            status: status.as_u16(),
            headers,
            body: bytes.to_vec(),
            final_url,
            elapsed: start.elapsed(),
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult<FetchResponse> {
        HttpFetcher::fetch(self, url, options).await
    }
}

fn classify_transport_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout { url: url.to_string(), elapsed_ms: 0 }
    } else if e.is_connect() {
        FetchError::Dns { host: url.to_string() }
    } else {
        FetchError::Malformed { url: url.to_string(), reason: e.to_string() }
    }
}

/// Jitter source for retries; swapped for a deterministic fn in tests.
fn rand_fraction() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// Shared handle type passed around the `Runtime`.
pub type SharedHttpFetcher = Arc<HttpFetcher>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fetch_options_have_expected_values() {
        let options = FetchOptions::default();
        assert_eq!(options.max_bytes, 2 * 1024 * 1024);
        assert_eq!(options.method, reqwest::Method::GET);
    }

    #[test]
    fn too_large_is_not_retryable() {
        let err = FetchError::TooLarge { url: "https://example.com".into(), max_bytes: 10 };
        assert!(!err.retryable());
    }

    #[test]
    fn dns_and_timeout_are_retryable() {
        assert!(FetchError::Dns { host: "example.com".into() }.retryable());
        assert!(FetchError::Timeout { url: "https://example.com".into(), elapsed_ms: 10 }.retryable());
    }
}
