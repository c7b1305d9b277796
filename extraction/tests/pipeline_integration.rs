//! Cross-component scenarios driven against mock collaborators: selection,
//! extraction, aggregation, social-link merging and embedding wired
//! together the way `pipeline::run_phases` wires them, minus discovery and
//! the batch supervisor (both bound to concrete, non-mockable resources —
//! see `DESIGN.md`).

use std::collections::HashMap;

use extraction::config::{AggregationConfig, EmbeddingConfig, PageExtractionConfig, SelectionConfig, SocialConfig};
use extraction::testing::{sample_discovered_urls, MockBrowser, MockEmbeddingProvider, MockFetcher, MockLlmClient};
use extraction::types::record::{CompanyInput, Record, SelectionMethod};
use extraction::{aggregate, embedding, extract, selection, social};

fn base_record() -> Record {
    Record::new(&CompanyInput::new("Acme").with_website("https://acme.com"))
}

/// Scenario: small static site. Every page fetches cleanly over plain HTTP,
/// the LLM ranks pages, aggregation returns a valid JSON object, social
/// links are found, and embedding succeeds.
#[tokio::test]
async fn small_static_site_end_to_end() {
    let discovered = sample_discovered_urls("https://acme.com");

    let fetcher = MockFetcher::new()
        .with_html("https://acme.com", "<html><body><h1>Acme</h1><p>We build widgets.</p></body></html>")
        .with_html("https://acme.com/about", "<html><body><p>About Acme, founded 2010.</p></body></html>")
        .with_html(
            "https://acme.com/contact",
            r#"<html><body><p>Contact Acme Inc. at hello@acme.com.</p><footer><a href="https://twitter.com/acme">Twitter</a></footer></body></html>"#,
        );

    let llm = MockLlmClient::new().with_response(
        r#"["https://acme.com", "https://acme.com/about", "https://acme.com/contact"]"#,
    );

    let mut record = base_record();
    let selection =
        selection::select(&llm, &discovered, &SelectionConfig::default(), &HashMap::new(), &mut record).await;
    assert_eq!(selection.method, SelectionMethod::Llm);
    assert_eq!(selection.urls.len(), 3);
    assert_eq!(record.llm_calls.len(), 1);

    let pages =
        extract::extract_pages(&fetcher, None, &selection.urls, &PageExtractionConfig::default(), None).await;
    assert!(pages.iter().all(|p| p.success));
    let aggregator = MockLlmClient::new().with_response(
        r#"{"description": "Widget maker", "industry": "Manufacturing", "key_services": ["widgets"]}"#,
    );
    let ok = aggregate::aggregate(
        &aggregator,
        &mut record,
        &pages,
        &AggregationConfig::default(),
        &HashMap::new(),
    )
    .await;
    assert!(ok);
    assert_eq!(record.description.as_deref(), Some("Widget maker"));

    let link_sets = pages.iter().map(|p| social::extract_from_page(&p.raw_html, &p.url, &SocialConfig::default()));
    record.social_media = social::merge_links(link_sets);
    assert!(record.social_media.values().any(|url| url.contains("twitter.com/acme")));

    let embedder = MockEmbeddingProvider::new(EmbeddingConfig::default().dimension);
    let text = embedding::canonical_text(
        &record.name,
        record.industry.as_deref().unwrap_or_default(),
        record.description.as_deref().unwrap_or_default(),
        "",
        &record.key_services,
    );
    let vector = embedding::embed_with_retry(&embedder, &EmbeddingConfig::default(), &text).await.unwrap();
    assert_eq!(vector.len(), EmbeddingConfig::default().dimension);
}

/// Scenario: the selection LLM call fails outright. Selection must fall
/// back to the heuristic ranking rather than propagate the error.
#[tokio::test]
async fn llm_selection_failure_falls_back_to_heuristic() {
    let discovered = sample_discovered_urls("https://acme.com");
    let llm = MockLlmClient::new().with_error(extraction::LlmError::Quota { provider_id: "mock".into() });

    let mut record = base_record();
    let result =
        selection::select(&llm, &discovered, &SelectionConfig::default(), &HashMap::new(), &mut record).await;

    assert_eq!(result.method, SelectionMethod::Heuristic);
    assert!(!result.urls.is_empty());
    assert!(record.llm_calls.is_empty());
}

/// Scenario: a consent popup wraps a share-intent social link; only the
/// genuine footer links should survive merging.
#[tokio::test]
async fn consent_popup_links_are_filtered_before_merge() {
    let html = extraction::testing::fixture_html_with_social_links();
    let fetcher = MockFetcher::new().with_html("https://acme.com", html.clone());

    let pages = extract::extract_pages(
        &fetcher,
        None,
        &["https://acme.com".to_string()],
        &PageExtractionConfig::default(),
        None,
    )
    .await;
    assert!(pages[0].success);

    let link_sets = vec![social::extract_from_page(&html, "https://acme.com", &SocialConfig::default())];
    let merged = social::merge_links(link_sets);

    let twitter = merged.get(&extraction::types::SocialPlatform::Twitter).expect("twitter link found");
    assert!(twitter.contains("/acme"));
    assert!(!twitter.contains("share?url"));
}

/// Scenario: every discovered page fails to fetch. Extraction reports the
/// phase as failed; the pipeline would mark the record `failed(no_content)`.
#[tokio::test]
async fn no_content_when_every_page_fails() {
    let fetcher = MockFetcher::new().fail_unknown();
    let urls = vec!["https://dead.example".to_string(), "https://dead.example/about".to_string()];

    let pages = extract::extract_pages(&fetcher, None, &urls, &PageExtractionConfig::default(), None).await;

    assert!(extract::phase_failed(&pages));
}

/// Scenario: the HTTP fetch for a page returns nothing usable, but the
/// browser fallback renders the same URL successfully.
#[tokio::test]
async fn browser_fallback_rescues_js_rendered_page() {
    let fetcher = MockFetcher::new().with_html("https://acme.com/app", "<html><body></body></html>");
    let browser = MockBrowser::new().with_page("https://acme.com/app", "<html><body><p>Rendered content</p></body></html>");

    let pages = extract::extract_pages(
        &fetcher,
        Some(&browser),
        &["https://acme.com/app".to_string()],
        &PageExtractionConfig::default(),
        None,
    )
    .await;

    assert!(pages[0].success);
    assert!(pages[0].cleaned_text.contains("Rendered content"));
    assert_eq!(browser.call_count(), 1);
}

/// Scenario: aggregation's first response is not valid JSON; the
/// reinforced retry succeeds and the record still gets populated.
#[tokio::test]
async fn aggregation_retries_once_on_malformed_json() {
    let llm = MockLlmClient::new()
        .with_response("not json at all")
        .with_response(r#"{"description": "Widget maker"}"#);
    let pages = vec![extraction::testing::sample_page("https://acme.com", "We build widgets.")];
    let mut record = base_record();

    let ok = aggregate::aggregate(&llm, &mut record, &pages, &AggregationConfig::default(), &HashMap::new()).await;

    assert!(ok);
    assert_eq!(record.description.as_deref(), Some("Widget maker"));
    assert_eq!(llm.call_count(), 2);
}

/// Scenario: the embedding provider fails every attempt; the retry helper
/// gives up rather than hanging, and the caller can mark the record partial.
#[tokio::test]
async fn embedding_failure_surfaces_as_error_not_panic() {
    let embedder = MockEmbeddingProvider::new(16);
    embedder.set_failing(true);

    let result = embedding::embed_with_retry(&embedder, &EmbeddingConfig::default(), "Acme widgets").await;

    assert!(result.is_err());
}
