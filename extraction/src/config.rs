//! Layered configuration for the extraction pipeline.
//!
//! Each namespace is its own builder-pattern struct with a `Default` impl
//! matching the defaults named in the configuration surface, following the
//! `CrawlConfig`/`ExtractionConfig` convention used elsewhere in this crate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub large_model_id: String,
    pub small_model_id: String,
    pub workers: usize,
    pub rate_rpm: Option<u32>,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            large_model_id: "gpt-4o".to_string(),
            small_model_id: "gpt-4o-mini".to_string(),
            workers: 2,
            rate_rpm: None,
            max_retries: 3,
        }
    }
}

impl LlmConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_rate_rpm(mut self, rpm: u32) -> Self {
        self.rate_rpm = Some(rpm);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model_id: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: "text-embedding-3-small".to_string(),
            dimension: 1536,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_s: u64,
    pub max_retries: u32,
    pub max_bytes: usize,
    pub strict_tls: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            timeout_s: 15,
            max_retries: 2,
            max_bytes: 2 * 1024 * 1024,
            strict_tls: false,
        }
    }
}

impl HttpConfig {
    pub fn with_strict_tls(mut self, strict: bool) -> Self {
        self.strict_tls = strict;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub depth: u32,
    pub max_urls: usize,
    pub phase1_page_cap: usize,
    pub strip_query: bool,
    pub exclude_regex: Option<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            depth: 3,
            max_urls: 1000,
            phase1_page_cap: 50,
            strip_query: true,
            exclude_regex: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    pub k: usize,
    pub temperature: f32,
    pub heuristic_priorities: Vec<String>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            k: 10,
            temperature: 0.1,
            heuristic_priorities: [
                "/contact", "/about", "/team", "/careers", "/leadership", "/products",
                "/services", "/pricing", "/company",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExtractionConfig {
    pub concurrency: usize,
    pub page_timeout_s: u64,
    pub max_chars: usize,
}

impl Default for PageExtractionConfig {
    fn default() -> Self {
        Self { concurrency: 10, page_timeout_s: 30, max_chars: 10_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub per_page_chars: usize,
    pub max_prompt_chars: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self { per_page_chars: 5_000, max_prompt_chars: 400_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    pub consent_selectors: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            consent_selectors: crate::social::default_consent_selectors(),
            exclude_patterns: [
                "/intent/tweet",
                "/sharer",
                "/share?",
                "/dialog/share",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub concurrency: usize,
    pub consecutive_failure_threshold: u32,
    pub progress_every: usize,
    pub input_queue_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            consecutive_failure_threshold: 3,
            progress_every: 5,
            input_queue_size: 6,
        }
    }
}

impl BatchConfig {
    pub fn with_concurrency(mut self, k: usize) -> Self {
        self.concurrency = k;
        self.input_queue_size = 2 * k;
        self
    }
}

/// Price-per-token table keyed by `provider_id`.
pub type PriceTable = std::collections::HashMap<String, ProviderPrice>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPrice {
    pub in_per_1k: f64,
    pub out_per_1k: f64,
}

/// Top-level configuration composed from every namespace above.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub http: HttpConfig,
    pub discovery: DiscoveryConfig,
    pub selection: SelectionConfig,
    pub extraction: PageExtractionConfig,
    pub aggregation: AggregationConfig,
    pub social: SocialConfig,
    pub batch: BatchConfig,
    #[serde(default = "default_job_timeout_s")]
    pub job_timeout_s: u64,
    #[serde(default)]
    pub prices: PriceTable,
}

fn default_job_timeout_s() -> u64 {
    120
}

impl Config {
    pub fn new() -> Self {
        Self { job_timeout_s: default_job_timeout_s(), ..Default::default() }
    }

    pub fn with_job_timeout_s(mut self, seconds: u64) -> Self {
        self.job_timeout_s = seconds;
        self
    }

    pub fn price_for(&self, provider_id: &str) -> Option<&ProviderPrice> {
        self.prices.get(provider_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::new();
        assert_eq!(config.job_timeout_s, 120);
        assert_eq!(config.discovery.depth, 3);
        assert_eq!(config.selection.k, 10);
        assert_eq!(config.extraction.concurrency, 10);
        assert_eq!(config.batch.concurrency, 3);
        assert_eq!(config.embedding.dimension, 1536);
    }

    #[test]
    fn batch_with_concurrency_scales_queue() {
        let batch = BatchConfig::default().with_concurrency(5);
        assert_eq!(batch.concurrency, 5);
        assert_eq!(batch.input_queue_size, 10);
    }
}
