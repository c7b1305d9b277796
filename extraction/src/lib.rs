//! # Extraction
//!
//! A business-intelligence extraction pipeline: given a company name and
//! website, discover its pages, select the ones worth reading, pull and
//! clean their content, have an LLM aggregate a structured profile, collect
//! social links, and build a canonical embedding — all as one `Record`.
//!
//! ## Pipeline
//!
//! ```text
//! DISCOVER → SELECT → EXTRACT → AGGREGATE → SOCIAL → EMBED
//!
//! 1. Discovery walks robots.txt, sitemaps and a bounded crawl  -> DiscoveredUrl
//! 2. Selection narrows that list to the K most useful pages    -> SelectionResult
//! 3. Extraction fetches and cleans each page (browser fallback) -> PageContent
//! 4. Aggregation asks an LLM to fill in the structured fields   -> Record fields
//! 5. Social extraction scans the same pages for platform links  -> SocialPlatform map
//! 6. Embedding builds a canonical vector from the aggregated text
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use extraction::{Config, Runtime};
//! use extraction::pipeline::{run_extraction, CancelToken};
//! use extraction::security::ProviderCredentials;
//! use extraction::types::CompanyInput;
//!
//! let config = Config::new();
//! let creds = ProviderCredentials::new("sk-...", "gpt-4o-mini");
//! let runtime = Runtime::new(config, creds).await;
//!
//! let input = CompanyInput::new("Acme Inc").with_website("https://acme.example");
//! let record = run_extraction(&runtime, input, CancelToken::new()).await;
//! println!("{:?}", record.scrape_status);
//! ```
//!
//! ## Batches
//!
//! [`batch::run_batch`] drives many [`types::CompanyInput`]s against one
//! shared [`Runtime`], bounded by a concurrency limit and a circuit breaker that
//! stops admitting new jobs after a run of consecutive failures.
//!
//! ## Modules
//!
//! - [`types`] - domain types: `Record`, `CompanyInput`, progress events
//! - [`config`] - layered, builder-pattern configuration
//! - [`error`] - typed errors per collaborator
//! - [`security`] - SSRF protection and credential redaction
//! - [`retry`] - shared exponential-backoff-with-jitter helper
//! - [`http`] - C1 HTTP fetcher
//! - [`browser`] - C2 headless-browser fetcher
//! - [`llm`] - C3 LLM REST client and worker pool
//! - [`discovery`] - C4 page discovery (robots, sitemap, crawl)
//! - [`selection`] - C5 page selection (LLM-ranked, heuristic fallback)
//! - [`extract`] - C6 content extraction and HTML cleaning
//! - [`aggregate`] - C7 intelligence aggregation
//! - [`social`] - C8 social link extraction
//! - [`embedding`] - C9 canonical-text embedding
//! - [`pipeline`] - C10 the five-phase-plus-embedding state machine
//! - [`batch`] - C11 batch supervisor with circuit breaker
//! - [`progress`] - C12 progress event bus
//! - [`runtime`] - shared resources passed into pipeline and batch
//! - [`testing`] - mock collaborators (`MockFetcher`, `MockBrowser`,
//!   `MockLlmClient`, `MockEmbeddingProvider`, `MockPersistence`) and fixtures

pub mod aggregate;
pub mod batch;
pub mod browser;
pub mod config;
pub mod discovery;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod http;
pub mod llm;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod runtime;
pub mod security;
pub mod selection;
pub mod social;
pub mod testing;
pub mod types;

pub use config::Config;
pub use error::{
    BrowserError, EmbeddingError, FetchError, LlmError, PipelineError, SecurityError,
};
pub use pipeline::{run_extraction, CancelToken};
pub use progress::ProgressBus;
pub use runtime::Runtime;
pub use types::{CompanyInput, Record, ScrapeStatus};
