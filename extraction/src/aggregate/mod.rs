//! Intelligence Aggregator (C7): builds the extraction prompt from cleaned
//! page text, validates the JSON response against the record schema, and
//! accounts for token/cost usage.

use serde::Deserialize;
use tracing::warn;

use crate::config::{AggregationConfig, PriceTable};
use crate::extract::PageContent;
use crate::llm::{completion_cost, Complete, CompleteOptions};
use crate::types::record::{Classification, LlmCallRecord, Record};

#[derive(Debug, Deserialize, Default)]
struct AggregationResponse {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    value_proposition: Option<String>,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    business_model: Option<String>,
    #[serde(default)]
    target_market: Option<String>,
    #[serde(default)]
    company_size: Option<String>,
    #[serde(default)]
    founding_year: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    employee_count_range: Option<String>,
    #[serde(default)]
    company_culture: Option<String>,
    #[serde(default)]
    funding_status: Option<String>,
    #[serde(default)]
    company_stage: Option<RawClassification>,
    #[serde(default)]
    tech_sophistication: Option<RawClassification>,
    #[serde(default)]
    geographic_scope: Option<RawClassification>,
    #[serde(default)]
    business_model_type: Option<RawClassification>,
    #[serde(default)]
    decision_maker_type: Option<RawClassification>,
    #[serde(default)]
    sales_complexity: Option<RawClassification>,
    #[serde(default)]
    saas_classification: Option<RawClassification>,
    #[serde(default)]
    is_saas: Option<RawClassification>,
    #[serde(default)]
    tech_stack: Vec<String>,
    #[serde(default)]
    pain_points: Vec<String>,
    #[serde(default)]
    key_services: Vec<String>,
    #[serde(default)]
    competitive_advantages: Vec<String>,
    #[serde(default)]
    products_services_offered: Vec<String>,
    #[serde(default)]
    partnerships: Vec<String>,
    #[serde(default)]
    certifications: Vec<String>,
    #[serde(default)]
    awards: Vec<String>,
    #[serde(default)]
    recent_news: Vec<String>,
    #[serde(default)]
    leadership_team: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    value: String,
    #[serde(default)]
    confidence: f32,
}

/// Known-good enum domains per classification field; anything outside these
/// sets is coerced to `Classification::unknown()`.
fn allowed_values(field: &str) -> &'static [&'static str] {
    match field {
        "company_stage" => &["seed", "early", "growth", "mature", "enterprise"],
        "tech_sophistication" => &["low", "medium", "high"],
        "geographic_scope" => &["local", "regional", "national", "global"],
        "business_model_type" => &["b2b", "b2c", "b2b2c", "marketplace"],
        "decision_maker_type" => &["technical", "business", "mixed"],
        "sales_complexity" => &["self_serve", "low_touch", "high_touch", "enterprise"],
        "saas_classification" => &["pure_saas", "hybrid", "not_saas"],
        "is_saas" => &["true", "false"],
        _ => &[],
    }
}

fn coerce_classification(field: &str, raw: Option<RawClassification>) -> Option<Classification> {
    let raw = raw?;
    let domain = allowed_values(field);
    if !domain.is_empty() && !domain.contains(&raw.value.as_str()) {
        warn!(field, value = raw.value.as_str(), "coercing out-of-domain classification to unknown");
        return Some(Classification::unknown());
    }
    Some(Classification { value: raw.value, confidence: raw.confidence })
}

fn strip_code_fence(text: &str) -> &str {
    text.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```").trim()
}

fn parse_response(text: &str) -> Option<AggregationResponse> {
    serde_json::from_str(text).or_else(|_| serde_json::from_str(strip_code_fence(text))).ok()
}

fn build_prompt(pages: &[PageContent], config: &AggregationConfig) -> String {
    let mut prompt = String::from(
        "Extract structured business-intelligence fields from the following pages. \
         Return a single JSON object matching the schema fields exactly. Use \"unknown\" \
         for classifications you cannot determine from the text.\n\n",
    );

    for page in pages {
        if !page.success {
            continue;
        }
        let chunk: String = page.cleaned_text.chars().take(config.per_page_chars).collect();
        prompt.push_str(&format!("URL: {}\n{}\n---\n", page.url, chunk));
        if prompt.len() >= config.max_prompt_chars {
            break;
        }
    }

    prompt.chars().take(config.max_prompt_chars).collect()
}

fn apply_response(record: &mut Record, parsed: AggregationResponse) {
    record.description = parsed.description;
    record.value_proposition = parsed.value_proposition;
    record.industry = parsed.industry;
    record.business_model = parsed.business_model;
    record.target_market = parsed.target_market;
    record.company_size = parsed.company_size;
    record.founding_year = parsed.founding_year;
    record.location = parsed.location;
    record.employee_count_range = parsed.employee_count_range;
    record.company_culture = parsed.company_culture;
    record.funding_status = parsed.funding_status;
    record.company_stage = coerce_classification("company_stage", parsed.company_stage);
    record.tech_sophistication = coerce_classification("tech_sophistication", parsed.tech_sophistication);
    record.geographic_scope = coerce_classification("geographic_scope", parsed.geographic_scope);
    record.business_model_type = coerce_classification("business_model_type", parsed.business_model_type);
    record.decision_maker_type = coerce_classification("decision_maker_type", parsed.decision_maker_type);
    record.sales_complexity = coerce_classification("sales_complexity", parsed.sales_complexity);
    record.saas_classification = coerce_classification("saas_classification", parsed.saas_classification);
    record.is_saas = coerce_classification("is_saas", parsed.is_saas);
    record.tech_stack = parsed.tech_stack;
    record.pain_points = parsed.pain_points;
    record.key_services = parsed.key_services;
    record.competitive_advantages = parsed.competitive_advantages;
    record.products_services_offered = parsed.products_services_offered;
    record.partnerships = parsed.partnerships;
    record.certifications = parsed.certifications;
    record.awards = parsed.awards;
    record.recent_news = parsed.recent_news;
    record.leadership_team = parsed.leadership_team;
}

/// Run aggregation against `pages`, writing results into `record`. One
/// retry with a reinforcement line on a non-JSON first response; on a
/// second failure the record keeps empty fields (caller marks `partial`).
pub async fn aggregate(
    pool: &dyn Complete,
    record: &mut Record,
    pages: &[PageContent],
    config: &AggregationConfig,
    price_table: &PriceTable,
) -> bool {
    let prompt = build_prompt(pages, config);
    let options = CompleteOptions { temperature: 0.1, json_mode: true, ..Default::default() };

    let first = pool.complete(&prompt, &options).await;

    let completion = match first {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "aggregation call failed");
            return false;
        }
    };

    record.record_llm_call(LlmCallRecord {
        provider_id: completion.provider_id.clone(),
        input_tokens: completion.input_tokens as u64,
        output_tokens: completion.output_tokens as u64,
        cost_usd: completion_cost(price_table, &completion),
    });

    if let Some(parsed) = parse_response(&completion.text) {
        apply_response(record, parsed);
        return true;
    }

    warn!("aggregation response was not valid JSON, retrying with reinforcement");
    let reinforced = format!("{prompt}\n\nYour previous response was not valid JSON. Return ONLY the JSON object, no commentary.");
    let retry = match pool.complete(&reinforced, &options).await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "aggregation retry failed");
            return false;
        }
    };

    record.record_llm_call(LlmCallRecord {
        provider_id: retry.provider_id.clone(),
        input_tokens: retry.input_tokens as u64,
        output_tokens: retry.output_tokens as u64,
        cost_usd: completion_cost(price_table, &retry),
    });

    match parse_response(&retry.text) {
        Some(parsed) => {
            apply_response(record, parsed);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_invalid_enum_to_unknown() {
        let raw = RawClassification { value: "nonsense".into(), confidence: 0.8 };
        let result = coerce_classification("company_stage", Some(raw)).unwrap();
        assert!(result.is_unknown());
    }

    #[test]
    fn keeps_valid_enum_value() {
        let raw = RawClassification { value: "growth".into(), confidence: 0.9 };
        let result = coerce_classification("company_stage", Some(raw)).unwrap();
        assert_eq!(result.value, "growth");
    }

    #[test]
    fn build_prompt_skips_failed_pages() {
        let pages = vec![
            PageContent { url: "a".into(), cleaned_text: "good content".into(), raw_html: "".into(), success: true },
            PageContent { url: "b".into(), cleaned_text: "".into(), raw_html: "".into(), success: false },
        ];
        let prompt = build_prompt(&pages, &AggregationConfig::default());
        assert!(prompt.contains("good content"));
        assert!(!prompt.contains("URL: b"));
    }
}
