//! The `Record` type produced per company and its provenance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::types::platform::SocialPlatform;

/// Input to a single extraction job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyInput {
    pub name: String,
    pub website: Option<String>,
}

impl CompanyInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), website: None }
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }
}

/// Terminal (or in-flight) status of a job/record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    Pending,
    Running,
    Success,
    Partial,
    Failed,
}

/// Structured error surfaced on a failed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeError {
    pub kind: String,
    pub message: String,
}

impl ScrapeError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into() }
    }
}

/// Source of the Phase-2 selection result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    Llm,
    Heuristic,
}

/// An enumerated classification field: a value plus the model's confidence in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub value: String,
    pub confidence: f32,
}

impl Classification {
    /// The sentinel used when the model could not determine a value.
    pub fn unknown() -> Self {
        Self { value: "unknown".to_string(), confidence: 0.0 }
    }

    pub fn is_unknown(&self) -> bool {
        self.value == "unknown"
    }
}

/// One LLM call's token/cost provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCallRecord {
    pub provider_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// The structured business-intelligence record produced per company.
///
/// Mutated only by its owning pipeline (single-writer). Once
/// `scrape_status` leaves `pending`/`running` the record is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    // Identity
    pub id: String,
    pub name: String,
    pub website: String,

    // Descriptive
    pub description: Option<String>,
    pub value_proposition: Option<String>,
    pub industry: Option<String>,
    pub business_model: Option<String>,
    pub target_market: Option<String>,
    pub company_size: Option<String>,
    pub founding_year: Option<String>,
    pub location: Option<String>,
    pub employee_count_range: Option<String>,
    pub company_culture: Option<String>,
    pub funding_status: Option<String>,

    // Enumerated classifications
    pub company_stage: Option<Classification>,
    pub tech_sophistication: Option<Classification>,
    pub geographic_scope: Option<Classification>,
    pub business_model_type: Option<Classification>,
    pub decision_maker_type: Option<Classification>,
    pub sales_complexity: Option<Classification>,
    pub saas_classification: Option<Classification>,
    pub is_saas: Option<Classification>,

    // Lists
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub pain_points: Vec<String>,
    #[serde(default)]
    pub key_services: Vec<String>,
    #[serde(default)]
    pub competitive_advantages: Vec<String>,
    #[serde(default)]
    pub products_services_offered: Vec<String>,
    #[serde(default)]
    pub partnerships: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub awards: Vec<String>,
    #[serde(default)]
    pub recent_news: Vec<String>,
    #[serde(default)]
    pub leadership_team: Vec<String>,

    // Maps
    #[serde(default)]
    pub social_media: HashMap<SocialPlatform, String>,
    #[serde(default)]
    pub contact_info: HashMap<String, String>,

    // Provenance
    #[serde(default)]
    pub pages_crawled: Vec<String>,
    pub crawl_depth: u32,
    pub crawl_duration_seconds: f64,
    #[serde(default)]
    pub scraped_content_details: HashMap<String, usize>,
    #[serde(default)]
    pub llm_calls: Vec<LlmCallRecord>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost_usd: f64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub scrape_status: ScrapeStatus,
    pub scrape_error: Option<ScrapeError>,
    pub selection_method: Option<SelectionMethod>,
    pub normalized_origin: Option<String>,

    // Vector
    pub embedding: Option<Vec<f32>>,
}

impl Record {
    /// Create a new `pending` record with only identity fields set.
    pub fn new(input: &CompanyInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: input.name.clone(),
            website: input.website.clone().unwrap_or_default(),
            description: None,
            value_proposition: None,
            industry: None,
            business_model: None,
            target_market: None,
            company_size: None,
            founding_year: None,
            location: None,
            employee_count_range: None,
            company_culture: None,
            funding_status: None,
            company_stage: None,
            tech_sophistication: None,
            geographic_scope: None,
            business_model_type: None,
            decision_maker_type: None,
            sales_complexity: None,
            saas_classification: None,
            is_saas: None,
            tech_stack: Vec::new(),
            pain_points: Vec::new(),
            key_services: Vec::new(),
            competitive_advantages: Vec::new(),
            products_services_offered: Vec::new(),
            partnerships: Vec::new(),
            certifications: Vec::new(),
            awards: Vec::new(),
            recent_news: Vec::new(),
            leadership_team: Vec::new(),
            social_media: HashMap::new(),
            contact_info: HashMap::new(),
            pages_crawled: Vec::new(),
            crawl_depth: 0,
            crawl_duration_seconds: 0.0,
            scraped_content_details: HashMap::new(),
            llm_calls: Vec::new(),
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_cost_usd: 0.0,
            created_at: now,
            last_updated: now,
            scrape_status: ScrapeStatus::Pending,
            scrape_error: None,
            selection_method: None,
            normalized_origin: None,
            embedding: None,
        }
    }

    /// Record one LLM call's usage, keeping the aggregate totals in sync (invariant 1).
    pub fn record_llm_call(&mut self, call: LlmCallRecord) {
        self.total_input_tokens += call.input_tokens;
        self.total_output_tokens += call.output_tokens;
        self.total_cost_usd += call.cost_usd;
        self.llm_calls.push(call);
        self.touch();
    }

    /// Mark transition into `running` at the start of Phase 1.
    pub fn start(&mut self) {
        self.scrape_status = ScrapeStatus::Running;
        self.touch();
    }

    /// Finalize the record as `success`.
    pub fn finish_success(&mut self) {
        self.scrape_status = ScrapeStatus::Success;
        self.touch();
    }

    /// Finalize the record as `partial`, with the degrading cause.
    pub fn finish_partial(&mut self, error: ScrapeError) {
        self.scrape_status = ScrapeStatus::Partial;
        self.scrape_error = Some(error);
        self.touch();
    }

    /// Finalize the record as `failed`.
    pub fn finish_failed(&mut self, error: ScrapeError) {
        self.scrape_status = ScrapeStatus::Failed;
        self.scrape_error = Some(error);
        self.touch();
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    /// Invariant 1: totals equal the sum over `llm_calls`.
    pub fn totals_consistent(&self) -> bool {
        let (in_sum, out_sum, cost_sum) = self.llm_calls.iter().fold((0u64, 0u64, 0.0f64), |acc, c| {
            (acc.0 + c.input_tokens, acc.1 + c.output_tokens, acc.2 + c.cost_usd)
        });
        in_sum == self.total_input_tokens
            && out_sum == self.total_output_tokens
            && (cost_sum - self.total_cost_usd).abs() < 1e-9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> CompanyInput {
        CompanyInput::new("Acme Widgets").with_website("https://acme.example")
    }

    #[test]
    fn new_record_is_pending_with_identity_only() {
        let record = Record::new(&sample_input());
        assert_eq!(record.scrape_status, ScrapeStatus::Pending);
        assert_eq!(record.name, "Acme Widgets");
        assert!(record.description.is_none());
        assert!(record.created_at <= record.last_updated);
    }

    #[test]
    fn record_llm_call_keeps_totals_consistent() {
        let mut record = Record::new(&sample_input());
        record.record_llm_call(LlmCallRecord {
            provider_id: "openai:gpt-4o-mini".to_string(),
            input_tokens: 100,
            output_tokens: 50,
            cost_usd: 0.002,
        });
        record.record_llm_call(LlmCallRecord {
            provider_id: "openai:gpt-4o".to_string(),
            input_tokens: 5000,
            output_tokens: 800,
            cost_usd: 0.15,
        });
        assert_eq!(record.total_input_tokens, 5100);
        assert_eq!(record.total_output_tokens, 850);
        assert!(record.totals_consistent());
    }

    #[test]
    fn classification_unknown_sentinel() {
        let c = Classification::unknown();
        assert!(c.is_unknown());
        assert_eq!(c.confidence, 0.0);
    }
}
