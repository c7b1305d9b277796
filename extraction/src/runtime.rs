//! Shared runtime resources: one HTTP client, one browser handle,
//! one LLM worker pool, one progress bus, and the price table, constructed
//! once at startup and passed by reference into the pipeline and batch
//! supervisor. No global singletons.

use std::sync::Arc;

use crate::browser::BrowserFetcher;
use crate::config::Config;
use crate::http::HttpFetcher;
use crate::llm::client::LlmClient;
use crate::llm::LlmPool;
use crate::progress::ProgressBus;
use crate::security::{ProviderCredentials, UrlValidator};

/// Resources shared across every job in a batch.
pub struct Runtime {
    pub config: Config,
    pub http: Arc<HttpFetcher>,
    pub browser: Arc<BrowserFetcher>,
    pub llm: Arc<LlmPool>,
    pub progress: Arc<ProgressBus>,
    embedding_client: LlmClient,
}

impl Runtime {
    pub async fn new(config: Config, llm_credentials: ProviderCredentials) -> Self {
        let validator = UrlValidator::new();
        let http = Arc::new(HttpFetcher::new(config.http.clone()).with_validator(validator));
        let browser = Arc::new(BrowserFetcher::new(3));
        let embedding_client = LlmClient::new(llm_credentials.clone());
        let llm = Arc::new(
            LlmPool::new(llm_credentials, config.llm.workers, config.llm.rate_rpm, config.llm.max_retries).await,
        );
        let progress = Arc::new(ProgressBus::new());

        Self { config, http, browser, llm, progress, embedding_client }
    }

    /// The single client used for embedding calls, independent of the
    /// completion worker pool.
    pub fn embedding_client(&self) -> &LlmClient {
        &self.embedding_client
    }

    /// Tear down long-lived resources (the browser instance) at the end of
    /// a batch run.
    pub async fn shutdown(&self) {
        self.browser.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn runtime_builds_with_default_config() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "pong"}}],
                "usage": {"prompt_tokens": 1, "completion_tokens": 1},
            })))
            .mount(&server)
            .await;

        let creds = ProviderCredentials::new("sk-test", "gpt-4o-mini").with_base_url(server.uri());
        let runtime = Runtime::new(Config::new(), creds).await;
        assert_eq!(runtime.llm.worker_count(), runtime.config.llm.workers);
    }
}
