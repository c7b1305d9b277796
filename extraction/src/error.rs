//! Typed errors for the extraction pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Top-level error for a single extraction job.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration was invalid at construction time.
    #[error("config error: {0}")]
    Config(String),

    /// Fetch (HTTP) failure.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Browser rendering failure.
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    /// LLM call failure.
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    /// Embedding provider failure.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Persistence collaborator failure.
    #[error("persistence error: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// SSRF / URL validation failure.
    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    /// Phase 3 produced no usable content from any page.
    #[error("no content extracted")]
    NoContent,

    /// Job was cancelled by the caller.
    #[error("job cancelled")]
    Canceled,

    /// Job exceeded its overall timeout.
    #[error("job timed out after {0}s")]
    JobTimeout(u64),

    /// Anything that should never happen but must still be a `Result`.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stable string tag used in `Record.scrape_error` — never a stack trace.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "config_error",
            PipelineError::Fetch(_) => "fetch_error",
            PipelineError::Browser(_) => "browser_error",
            PipelineError::Llm(_) => "llm_error",
            PipelineError::Embedding(_) => "embedding_error",
            PipelineError::Persistence(_) => "persistence_error",
            PipelineError::Security(_) => "security_error",
            PipelineError::NoContent => "no_content",
            PipelineError::Canceled => "canceled",
            PipelineError::JobTimeout(_) => "timeout",
            PipelineError::Internal(_) => "internal_error",
        }
    }
}

/// Errors from the HTTP fetcher (C1).
#[derive(Debug, Error, Clone)]
pub enum FetchError {
    #[error("dns resolution failed for {host}")]
    Dns { host: String },

    #[error("tls error: {0}")]
    Tls(String),

    #[error("timed out after {elapsed_ms}ms fetching {url}")]
    Timeout { url: String, elapsed_ms: u64 },

    #[error("http status {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("response exceeded max_bytes ({max_bytes}) fetching {url}")]
    TooLarge { url: String, max_bytes: usize },

    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

impl FetchError {
    /// Whether this kind is eligible for the shared retry helper.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Dns { .. } | FetchError::Timeout { .. } | FetchError::HttpStatus { .. }
        )
    }
}

/// Errors from the headless-browser fetcher (C2).
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("page timed out after {timeout_s}s: {url}")]
    PageTimeout { url: String, timeout_s: u64 },

    #[error("navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("browser crashed or disconnected")]
    Disconnected,
}

/// Errors from the LLM client / worker pool (C3).
#[derive(Debug, Error, Clone)]
pub enum LlmError {
    #[error("authentication failed for provider {provider_id}")]
    Auth { provider_id: String },

    #[error("rate limited by provider {provider_id}, retry after {retry_after_s:?}s")]
    RateLimited {
        provider_id: String,
        retry_after_s: Option<u64>,
    },

    #[error("llm call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("malformed output from provider {provider_id}: {reason}")]
    MalformedOutput { provider_id: String, reason: String },

    #[error("quota exceeded for provider {provider_id}")]
    Quota { provider_id: String },

    #[error("no worker available within {waited_ms}ms")]
    PoolExhausted { waited_ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),
}

impl LlmError {
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. } | LlmError::Quota { .. } | LlmError::Transport(_)
        )
    }
}

/// Errors from the embedding provider (C9).
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider error: {0}")]
    Provider(String),

    #[error("returned vector had dimension {got}, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Security-related errors, primarily for SSRF protection.
#[derive(Debug, Error, Clone)]
pub enum SecurityError {
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    #[error("blocked host: {0}")]
    BlockedHost(String),

    #[error("blocked IP range: {0}")]
    BlockedCidr(String),

    #[error("URL has no host")]
    NoHost,

    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    #[error("URL parse error: {0}")]
    UrlParse(String),
}

impl From<url::ParseError> for SecurityError {
    fn from(e: url::ParseError) -> Self {
        SecurityError::UrlParse(e.to_string())
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
pub type FetchResult<T> = std::result::Result<T, FetchError>;
pub type BrowserResult<T> = std::result::Result<T, BrowserError>;
pub type LlmResult<T> = std::result::Result<T, LlmError>;
pub type EmbeddingResult<T> = std::result::Result<T, EmbeddingError>;
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;
