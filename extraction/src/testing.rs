//! Test fixtures and mock collaborators.
//!
//! `MockFetcher`, `MockBrowser`, `MockLlmClient` and `MockEmbeddingProvider`
//! implement the `Fetch`/`Render`/`Complete`/`Embed` traits so integration
//! tests can drive the pipeline end to end without a network. Each is
//! `RwLock`-backed, configured with canned responses keyed by input, and
//! tracks the calls it received for assertions. `MockPersistence` implements
//! the save-one-record contract the pipeline hands finished records to.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::browser::{Render, RenderOptions, RenderedPage};
use crate::discovery::DiscoveredUrl;
use crate::error::{FetchError, FetchResult, LlmError, PipelineError};
use crate::extract::PageContent;
use crate::http::{Fetch, FetchOptions, FetchResponse};
use crate::llm::{Complete, CompleteOptions, CompletionResult, Embed};
use crate::types::record::{CompanyInput, Record};

/// A `CompanyInput` with a website set, for tests that need one.
pub fn sample_company_input(name: impl Into<String>, website: impl Into<String>) -> CompanyInput {
    CompanyInput::new(name).with_website(website)
}

/// A small, three-URL discovery result spanning all three source tags.
pub fn sample_discovered_urls(origin: &str) -> Vec<DiscoveredUrl> {
    vec![
        DiscoveredUrl { url: origin.to_string(), source: "crawl", depth: 0 },
        DiscoveredUrl { url: format!("{origin}/about"), source: "sitemap", depth: 1 },
        DiscoveredUrl { url: format!("{origin}/contact"), source: "robots", depth: 1 },
    ]
}

/// A successful page with the given cleaned text and matching raw HTML.
pub fn sample_page(url: impl Into<String>, cleaned_text: impl Into<String>) -> PageContent {
    let cleaned_text = cleaned_text.into();
    let raw_html = format!("<html><body><p>{cleaned_text}</p></body></html>");
    PageContent { url: url.into(), cleaned_text, raw_html, success: true }
}

/// A page that failed to yield any content.
pub fn failed_page(url: impl Into<String>) -> PageContent {
    PageContent { url: url.into(), cleaned_text: String::new(), raw_html: String::new(), success: false }
}

/// HTML fixture carrying a consent banner and one social link per platform,
/// used by the social-extraction tests.
pub fn fixture_html_with_social_links() -> String {
    r#"
    <html>
      <body>
        <div id="onetrust-banner-sdk">
          <a href="https://twitter.com/share?url=x">share</a>
        </div>
        <footer>
          <a href="https://twitter.com/acme">Twitter</a>
          <a href="https://www.linkedin.com/company/acme">LinkedIn</a>
          <a href="https://facebook.com/acme">Facebook</a>
        </footer>
      </body>
    </html>
    "#
    .to_string()
}

/// Deterministic embedding for `text`, stable across runs and distinct for
/// distinct inputs. Mirrors how callers expect a real embedding provider to
/// behave without making a network call.
pub fn deterministic_embedding(text: &str, dim: usize) -> Vec<f32> {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = hasher.finalize();

    (0..dim)
        .map(|i| {
            let byte = hash[i % 32] as f32;
            (byte / 127.5) - 1.0
        })
        .collect()
}

/// Builds a `HashMap` of page URL -> character count, the shape
/// `Record.scraped_content_details` expects.
pub fn content_details(pages: &[PageContent]) -> HashMap<String, usize> {
    pages.iter().map(|p| (p.url.clone(), p.cleaned_text.len())).collect()
}

/// Mock `Fetch` implementation. Canned responses are keyed by exact URL;
/// a URL with no canned response yields a 404-shaped `FetchResponse` unless
/// `fail_unknown` routes it to a transport error instead.
#[derive(Default)]
pub struct MockFetcher {
    responses: Arc<RwLock<HashMap<String, FetchResult<FetchResponse>>>>,
    calls: Arc<RwLock<Vec<String>>>,
    fail_unknown: bool,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests to URLs with no canned response fail with a DNS error
    /// instead of falling back to a 404.
    pub fn fail_unknown(mut self) -> Self {
        self.fail_unknown = true;
        self
    }

    pub fn with_html(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        let response = FetchResponse {
            status: 200,
            headers: HashMap::new(),
            body: html.into().into_bytes(),
            final_url: String::new(),
            elapsed: std::time::Duration::from_millis(1),
        };
        self.responses.write().unwrap().insert(url.into(), Ok(response));
        self
    }

    pub fn with_redirect(self, url: impl Into<String>, final_url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        let final_url = final_url.into();
        let response = FetchResponse {
            status: 200,
            headers: HashMap::new(),
            body: html.into().into_bytes(),
            final_url: final_url.clone(),
            elapsed: std::time::Duration::from_millis(1),
        };
        self.responses.write().unwrap().insert(url, Ok(response));
        self
    }

    pub fn with_error(self, url: impl Into<String>, error: FetchError) -> Self {
        self.responses.write().unwrap().insert(url.into(), Err(error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl Fetch for MockFetcher {
    async fn fetch(&self, url: &str, _options: &FetchOptions) -> FetchResult<FetchResponse> {
        self.calls.write().unwrap().push(url.to_string());

        if let Some(canned) = self.responses.read().unwrap().get(url) {
            return canned.clone();
        }

        if self.fail_unknown {
            return Err(FetchError::Dns { host: url.to_string() });
        }

        Err(FetchError::HttpStatus { url: url.to_string(), status: 404 })
    }
}

/// Mock `Render` implementation. Every `render` call returns whatever was
/// configured for each requested URL, or a failed `RenderedPage` for URLs
/// with no canned page.
#[derive(Default)]
pub struct MockBrowser {
    pages: Arc<RwLock<HashMap<String, RenderedPage>>>,
    calls: Arc<RwLock<Vec<Vec<String>>>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        let page = RenderedPage { url: url.clone(), raw_html: html.into(), success: true };
        self.pages.write().unwrap().insert(url, page);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl Render for MockBrowser {
    async fn render(&self, urls: &[String], _options: &RenderOptions) -> HashMap<String, RenderedPage> {
        self.calls.write().unwrap().push(urls.to_vec());

        let pages = self.pages.read().unwrap();
        urls.iter()
            .map(|url| {
                let page = pages
                    .get(url)
                    .cloned()
                    .unwrap_or_else(|| RenderedPage { url: url.clone(), raw_html: String::new(), success: false });
                (url.clone(), page)
            })
            .collect()
    }
}

/// Mock `Complete` implementation for selection and aggregation tests.
/// Responses are served from a queue in call order; once exhausted, calls
/// return `LlmError::Quota` unless `default_response` is set.
#[derive(Default)]
pub struct MockLlmClient {
    queue: Arc<RwLock<VecDeque<Result<CompletionResult, LlmError>>>>,
    default_response: Arc<RwLock<Option<CompletionResult>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful JSON completion.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        let result = CompletionResult {
            text: text.into(),
            input_tokens: 10,
            output_tokens: 10,
            provider_id: "mock".to_string(),
        };
        self.queue.write().unwrap().push_back(Ok(result));
        self
    }

    pub fn with_error(self, error: LlmError) -> Self {
        self.queue.write().unwrap().push_back(Err(error));
        self
    }

    /// Served after the queue is exhausted, repeatedly.
    pub fn with_default_response(self, text: impl Into<String>) -> Self {
        let result = CompletionResult {
            text: text.into(),
            input_tokens: 10,
            output_tokens: 10,
            provider_id: "mock".to_string(),
        };
        *self.default_response.write().unwrap() = Some(result);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl Complete for MockLlmClient {
    async fn complete(&self, prompt: &str, _options: &CompleteOptions) -> Result<CompletionResult, LlmError> {
        self.calls.write().unwrap().push(prompt.to_string());

        if let Some(next) = self.queue.write().unwrap().pop_front() {
            return next;
        }

        if let Some(default) = self.default_response.read().unwrap().clone() {
            return Ok(default);
        }

        Err(LlmError::Quota { provider_id: "mock".to_string() })
    }
}

/// Mock `Embed` implementation backed by `deterministic_embedding`, so
/// embedding tests get stable vectors without a provider call.
pub struct MockEmbeddingProvider {
    dimension: usize,
    fail: Arc<RwLock<bool>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension, fail: Arc::new(RwLock::new(false)), calls: Arc::new(RwLock::new(Vec::new())) }
    }

    /// Every subsequent `embed` call fails with a timeout until cleared.
    pub fn set_failing(&self, failing: bool) {
        *self.fail.write().unwrap() = failing;
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl Embed for MockEmbeddingProvider {
    async fn embed(&self, text: &str, _model: &str) -> Result<Vec<f32>, LlmError> {
        self.calls.write().unwrap().push(text.to_string());

        if *self.fail.read().unwrap() {
            return Err(LlmError::Timeout { elapsed_ms: 1000 });
        }

        Ok(deterministic_embedding(text, self.dimension))
    }
}

/// The save-one-record contract the pipeline hands finished records to.
/// The core never calls this itself; it exists so integration tests can
/// exercise a full discover-through-persist scenario against a double.
pub trait Persistence: Send + Sync {
    fn save(&self, record: &Record) -> Result<(), PipelineError>;
}

/// In-memory `Persistence`, keyed by record id so repeated `save` calls for
/// the same id overwrite rather than accumulate (mirrors the idempotent
/// `save(record)` contract).
#[derive(Default)]
pub struct MockPersistence {
    records: Arc<RwLock<HashMap<String, Record>>>,
}

impl MockPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Record> {
        self.records.read().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Persistence for MockPersistence {
    fn save(&self, record: &Record) -> Result<(), PipelineError> {
        self.records.write().unwrap().insert(record.id.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_discovered_urls_cover_all_sources() {
        let urls = sample_discovered_urls("https://example.com");
        let sources: Vec<_> = urls.iter().map(|u| u.source).collect();
        assert!(sources.contains(&"crawl"));
        assert!(sources.contains(&"sitemap"));
        assert!(sources.contains(&"robots"));
    }

    #[test]
    fn deterministic_embedding_is_stable_and_distinct() {
        let a1 = deterministic_embedding("hello", 32);
        let a2 = deterministic_embedding("hello", 32);
        let b = deterministic_embedding("world", 32);
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(a1.len(), 32);
    }

    #[test]
    fn content_details_maps_url_to_length() {
        let pages = vec![sample_page("https://example.com", "hello world")];
        let details = content_details(&pages);
        assert_eq!(details["https://example.com"], "hello world".len());
    }

    #[tokio::test]
    async fn mock_fetcher_serves_canned_html_and_tracks_calls() {
        let fetcher = MockFetcher::new().with_html("https://acme.com", "<p>hi</p>");
        let response = fetcher.fetch("https://acme.com", &FetchOptions::default()).await.unwrap();
        assert_eq!(response.text(), "<p>hi</p>");
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn mock_fetcher_unknown_url_404s_by_default() {
        let fetcher = MockFetcher::new();
        let result = fetcher.fetch("https://unknown.com", &FetchOptions::default()).await;
        assert!(matches!(result, Err(FetchError::HttpStatus { status: 404, .. })));
    }

    #[tokio::test]
    async fn mock_browser_returns_failed_page_for_unrendered_url() {
        let browser = MockBrowser::new().with_page("https://acme.com", "<p>rendered</p>");
        let pages = browser.render(&["https://acme.com".to_string(), "https://other.com".to_string()], &RenderOptions::default()).await;
        assert!(pages["https://acme.com"].success);
        assert!(!pages["https://other.com"].success);
    }

    #[tokio::test]
    async fn mock_llm_client_serves_queued_response_then_default() {
        let client = MockLlmClient::new().with_response("first").with_default_response("fallback");
        let first = client.complete("p1", &CompleteOptions::default()).await.unwrap();
        let second = client.complete("p2", &CompleteOptions::default()).await.unwrap();
        assert_eq!(first.text, "first");
        assert_eq!(second.text, "fallback");
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn mock_embedding_provider_respects_failure_toggle() {
        let provider = MockEmbeddingProvider::new(16);
        assert!(provider.embed("hello", "model").await.is_ok());
        provider.set_failing(true);
        assert!(provider.embed("hello", "model").await.is_err());
    }

    #[test]
    fn mock_persistence_save_is_idempotent_on_id() {
        let store = MockPersistence::new();
        let record = Record::new(&sample_company_input("Acme", "https://acme.com"));
        store.save(&record).unwrap();
        store.save(&record).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&record.id).unwrap().name, "Acme");
    }
}
