//! Fixed worker pool over `LlmClient` instances with optional token-bucket
//! rate limiting (via `governor`) and the shared retry helper.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::LlmError;
use crate::llm::client::{CompleteOptions, CompletionResult, LlmClient};
use crate::retry::{retry_with_backoff, BackoffPolicy};
use crate::security::ProviderCredentials;

/// The completion capability `selection` and `aggregate` depend on.
#[async_trait]
pub trait Complete: Send + Sync {
    async fn complete(&self, prompt: &str, options: &CompleteOptions) -> Result<CompletionResult, LlmError>;
}

type Limiter = GovernorRateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Fixed-size pool of independently-owned LLM clients. Admission is
/// bounded by a semaphore sized to the number of workers that survive
/// pre-warming; a `governor` token-bucket limiter sits in front when
/// `rate_rpm` is configured.
pub struct LlmPool {
    clients: Vec<LlmClient>,
    semaphore: Arc<Semaphore>,
    limiter: Option<Limiter>,
    max_retries: u32,
}

impl LlmPool {
    /// Build a pool of `workers` clients, each probed with a trivial
    /// completion before admission. A worker that fails the probe (bad
    /// credentials, unreachable host) is dropped rather than admitted.
    pub async fn new(credentials: ProviderCredentials, workers: usize, rate_rpm: Option<u32>, max_retries: u32) -> Self {
        let candidates: Vec<LlmClient> =
            (0..workers.max(1)).map(|_| LlmClient::new(credentials.clone())).collect();
        let clients = Self::prewarm(candidates).await;

        let limiter = rate_rpm.and_then(NonZeroU32::new).map(|rpm| {
            GovernorRateLimiter::direct(Quota::per_minute(rpm))
        });
        Self {
            semaphore: Arc::new(Semaphore::new(clients.len().max(1))),
            clients,
            limiter,
            max_retries,
        }
    }

    async fn prewarm(candidates: Vec<LlmClient>) -> Vec<LlmClient> {
        let probe = CompleteOptions {
            max_output_tokens: 1,
            temperature: 0.0,
            json_mode: false,
            timeout: Duration::from_secs(10),
        };

        let mut admitted = Vec::with_capacity(candidates.len());
        for client in candidates {
            match client.complete("ping", &probe).await {
                Ok(_) => admitted.push(client),
                Err(e) => warn!(model = client.model(), error = %e, "worker failed pre-warm, not admitted"),
            }
        }
        admitted
    }

    /// Run a completion on the next available worker, retrying transient
    /// failures via the shared backoff helper.
    pub async fn complete(&self, prompt: &str, options: &CompleteOptions) -> Result<CompletionResult, LlmError> {
        if self.clients.is_empty() {
            return Err(LlmError::PoolExhausted { waited_ms: 0 });
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| LlmError::PoolExhausted { waited_ms: 0 })?;

        if let Some(limiter) = &self.limiter {
            self.wait_for_rate_limit(limiter, Duration::from_secs(10)).await?;
        }

        let client = self.pick_client();
        let policy = BackoffPolicy::new(self.max_retries);

        retry_with_backoff(policy, rand_fraction, LlmError::retryable, || client.complete(prompt, options)).await
    }

    async fn wait_for_rate_limit(&self, limiter: &Limiter, bound: Duration) -> Result<(), LlmError> {
        let deadline = tokio::time::Instant::now() + bound;
        loop {
            match limiter.check() {
                Ok(()) => return Ok(()),
                Err(_) if tokio::time::Instant::now() >= deadline => {
                    return Err(LlmError::PoolExhausted { waited_ms: bound.as_millis() as u64 });
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    }

    fn pick_client(&self) -> &LlmClient {
        let idx = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as usize)
            % self.clients.len();
        &self.clients[idx]
    }

    pub fn worker_count(&self) -> usize {
        self.clients.len()
    }
}

#[async_trait]
impl Complete for LlmPool {
    async fn complete(&self, prompt: &str, options: &CompleteOptions) -> Result<CompletionResult, LlmError> {
        LlmPool::complete(self, prompt, options).await
    }
}

fn rand_fraction() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds_for(base_url: &str) -> ProviderCredentials {
        ProviderCredentials::new("sk-test", "gpt-4o-mini").with_base_url(base_url)
    }

    async fn healthy_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "pong"}}],
                "usage": {"prompt_tokens": 1, "completion_tokens": 1},
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn pool_admits_every_worker_when_prewarm_succeeds() {
        let server = healthy_server().await;
        let pool = LlmPool::new(creds_for(&server.uri()), 4, None, 3).await;
        assert_eq!(pool.worker_count(), 4);
    }

    #[tokio::test]
    async fn pool_rounds_zero_workers_up_to_one_before_prewarm() {
        let server = healthy_server().await;
        let pool = LlmPool::new(creds_for(&server.uri()), 0, None, 3).await;
        assert_eq!(pool.worker_count(), 1);
    }

    #[tokio::test]
    async fn workers_failing_prewarm_are_not_admitted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let pool = LlmPool::new(creds_for(&server.uri()), 3, None, 3).await;
        assert_eq!(pool.worker_count(), 0);
    }

    #[tokio::test]
    async fn complete_on_an_empty_pool_reports_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let pool = LlmPool::new(creds_for(&server.uri()), 1, None, 3).await;
        let err = pool.complete("hi", &CompleteOptions::default()).await.unwrap_err();
        assert!(matches!(err, LlmError::PoolExhausted { .. }));
    }
}
