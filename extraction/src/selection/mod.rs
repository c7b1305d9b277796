//! Page Selector (C5): LLM-driven ranking of discovered URLs down to `k`,
//! falling back to a heuristic when the LLM call fails or returns nothing
//! usable.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::warn;

use crate::config::{PriceTable, SelectionConfig};
use crate::discovery::{source_priority, DiscoveredUrl};
use crate::llm::{completion_cost, Complete, CompleteOptions, CompletionResult};
use crate::types::record::{LlmCallRecord, Record, SelectionMethod};

#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub urls: Vec<String>,
    pub method: SelectionMethod,
}

#[derive(Deserialize)]
struct LlmSelectionResponse {
    urls: Vec<String>,
}

fn strip_code_fence(text: &str) -> &str {
    text.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```").trim()
}

fn parse_llm_urls(text: &str) -> Option<Vec<String>> {
    serde_json::from_str::<Vec<String>>(text)
        .or_else(|_| serde_json::from_str::<Vec<String>>(strip_code_fence(text)))
        .ok()
        .or_else(|| {
            serde_json::from_str::<LlmSelectionResponse>(strip_code_fence(text)).ok().map(|r| r.urls)
        })
}

fn root_url(discovered: &[DiscoveredUrl]) -> Option<String> {
    discovered.iter().min_by_key(|d| (d.depth, d.url.len())).map(|d| d.url.clone())
}

fn heuristic_select(discovered: &[DiscoveredUrl], config: &SelectionConfig) -> Vec<String> {
    let mut ranked: Vec<&DiscoveredUrl> = discovered.iter().collect();
    ranked.sort_by_key(|d| {
        let priority_rank = config
            .heuristic_priorities
            .iter()
            .position(|p| d.url.contains(p.as_str()))
            .unwrap_or(config.heuristic_priorities.len());
        let depth_penalty = d.url.matches('/').count();
        (priority_rank, depth_penalty, source_priority(d.source))
    });

    let mut out = Vec::new();
    let mut seen = HashSet::new();

    if let Some(root) = root_url(discovered) {
        if seen.insert(root.clone()) {
            out.push(root);
        }
    }

    for d in ranked {
        if out.len() >= config.k {
            break;
        }
        if seen.insert(d.url.clone()) {
            out.push(d.url.clone());
        }
    }

    out.truncate(config.k);
    out
}

const SYSTEM_PROMPT: &str = "You select which of a company's discovered web pages are most likely \
to contain business-intelligence-relevant content (about, team, products, pricing, contact, \
careers). Return a JSON array of URL strings only, most relevant first, at most the requested count.";

fn record_call(record: &mut Record, price_table: &PriceTable, completion: &CompletionResult) {
    record.record_llm_call(LlmCallRecord {
        provider_id: completion.provider_id.clone(),
        input_tokens: completion.input_tokens as u64,
        output_tokens: completion.output_tokens as u64,
        cost_usd: completion_cost(price_table, completion),
    });
}

/// Select up to `config.k` URLs, preferring the LLM's ranking and falling
/// back to the heuristic priority list when the call fails or the
/// response can't be parsed into a non-empty URL list. Records the LLM
/// call's token/cost usage into `record` when the call is actually made.
pub async fn select(
    pool: &dyn Complete,
    discovered: &[DiscoveredUrl],
    config: &SelectionConfig,
    price_table: &PriceTable,
    record: &mut Record,
) -> SelectionResult {
    if discovered.is_empty() {
        return SelectionResult { urls: Vec::new(), method: SelectionMethod::Heuristic };
    }

    let urls_list = discovered.iter().map(|d| d.url.as_str()).collect::<Vec<_>>().join("\n");
    let prompt = format!(
        "{SYSTEM_PROMPT}\n\nSelect at most {} URLs from this list:\n{urls_list}",
        config.k
    );

    let options = CompleteOptions { temperature: config.temperature, json_mode: true, ..Default::default() };

    let completion = match pool.complete(&prompt, &options).await {
        Ok(result) => Some(result),
        Err(e) => {
            warn!(error = %e, "selection call failed, falling back to heuristic");
            None
        }
    };

    let llm_urls = completion.as_ref().and_then(|r| parse_llm_urls(&r.text));

    if let Some(completion) = completion {
        record_call(record, price_table, &completion);
    }

    let discovered_set: HashSet<&str> = discovered.iter().map(|d| d.url.as_str()).collect();

    if let Some(mut urls) = llm_urls {
        urls.retain(|u| discovered_set.contains(u.as_str()));
        let mut seen = HashSet::new();
        urls.retain(|u| seen.insert(u.clone()));

        if let Some(root) = root_url(discovered) {
            if !urls.contains(&root) {
                urls.insert(0, root);
            }
        }

        urls.truncate(config.k);

        if !urls.is_empty() {
            return SelectionResult { urls, method: SelectionMethod::Llm };
        }
    }

    SelectionResult { urls: heuristic_select(discovered, config), method: SelectionMethod::Heuristic }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovered() -> Vec<DiscoveredUrl> {
        vec![
            DiscoveredUrl { url: "https://acme.com".into(), source: "crawl", depth: 0 },
            DiscoveredUrl { url: "https://acme.com/about".into(), source: "sitemap", depth: 1 },
            DiscoveredUrl { url: "https://acme.com/contact".into(), source: "crawl", depth: 1 },
            DiscoveredUrl { url: "https://acme.com/blog/2020/post".into(), source: "crawl", depth: 3 },
        ]
    }

    #[test]
    fn heuristic_always_includes_root() {
        let config = SelectionConfig { k: 2, ..SelectionConfig::default() };
        let urls = heuristic_select(&discovered(), &config);
        assert_eq!(urls[0], "https://acme.com");
        assert!(urls.len() <= 2);
    }

    #[test]
    fn heuristic_prefers_priority_paths() {
        let config = SelectionConfig { k: 3, ..SelectionConfig::default() };
        let urls = heuristic_select(&discovered(), &config);
        assert!(urls.contains(&"https://acme.com/contact".to_string()));
    }

    #[test]
    fn parse_llm_urls_handles_code_fence() {
        let text = "```json\n[\"https://a.com\", \"https://b.com\"]\n```";
        let urls = parse_llm_urls(text).unwrap();
        assert_eq!(urls, vec!["https://a.com", "https://b.com"]);
    }

    #[tokio::test]
    async fn select_records_llm_usage_on_success() {
        use crate::testing::MockLlmClient;
        use crate::types::record::{CompanyInput, Record};

        let llm = MockLlmClient::new().with_response(r#"["https://acme.com/about"]"#);
        let mut record = Record::new(&CompanyInput::new("Acme").with_website("https://acme.com"));
        let price_table = PriceTable::new();

        select(&llm, &discovered(), &SelectionConfig::default(), &price_table, &mut record).await;

        assert_eq!(record.llm_calls.len(), 1);
        assert_eq!(record.llm_calls[0].provider_id, "mock");
        assert!(record.totals_consistent());
    }

    #[tokio::test]
    async fn select_records_nothing_when_call_fails() {
        use crate::error::LlmError;
        use crate::testing::MockLlmClient;
        use crate::types::record::{CompanyInput, Record};

        let llm = MockLlmClient::new().with_error(LlmError::Quota { provider_id: "mock".to_string() });
        let mut record = Record::new(&CompanyInput::new("Acme").with_website("https://acme.com"));
        let price_table = PriceTable::new();

        let result = select(&llm, &discovered(), &SelectionConfig::default(), &price_table, &mut record).await;

        assert!(record.llm_calls.is_empty());
        assert_eq!(result.method, SelectionMethod::Heuristic);
    }
}
