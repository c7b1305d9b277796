//! Extraction Pipeline (C10): the five-phase-plus-embedding state machine
//! that turns one `CompanyInput` into a finished `Record`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::aggregate;
use crate::discovery;
use crate::embedding;
use crate::extract::{self, PageContent, PageProgress};
use crate::runtime::Runtime;
use crate::selection;
use crate::social;
use crate::types::record::{CompanyInput, Record, ScrapeError};
use crate::types::{JobPhase, PhaseStatus, ProgressEvent};

/// Cooperative cancellation flag checked between phase boundaries.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

async fn emit(runtime: &Runtime, job_id: &str, phase: JobPhase, status: PhaseStatus, message: impl Into<String>) {
    runtime.progress.publish(ProgressEvent::new(job_id, phase, status, message)).await;
}

/// Publishes a `progress` event onto the bus as each page finishes
/// extraction, alongside the `started`/`completed` events for the phase
/// as a whole.
struct ExtractionProgress<'a> {
    runtime: &'a Runtime,
    job_id: &'a str,
    total: usize,
    done: AtomicUsize,
}

#[async_trait]
impl<'a> PageProgress for ExtractionProgress<'a> {
    async fn on_page(&self, content: &PageContent) {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        emit(
            self.runtime,
            self.job_id,
            JobPhase::Extraction,
            PhaseStatus::Progress,
            format!("{done}/{} pages done: {}", self.total, content.url),
        )
        .await;
    }
}

/// Run the full pipeline for one company, bounded by `config.job_timeout_s`
/// and cooperatively cancellable via `cancel`.
pub async fn run_extraction(runtime: &Runtime, input: CompanyInput, cancel: CancelToken) -> Record {
    let job_id = uuid::Uuid::new_v4().to_string();
    let mut record = Record::new(&input);
    let started = std::time::Instant::now();

    let timeout = std::time::Duration::from_secs(runtime.config.job_timeout_s);
    let body = run_phases(runtime, &job_id, &mut record, &cancel);

    match tokio::time::timeout(timeout, body).await {
        Ok(Ok(())) => {
            if record.scrape_error.is_some() {
                let error = record.scrape_error.clone().unwrap();
                record.finish_partial(error);
            } else {
                record.finish_success();
            }
        }
        Ok(Err(error)) => {
            record.finish_failed(error);
        }
        Err(_) => {
            record.finish_failed(ScrapeError::new("timeout", format!("job exceeded {}s", runtime.config.job_timeout_s)));
        }
    }

    record.crawl_duration_seconds = started.elapsed().as_secs_f64();
    record
}

async fn run_phases(
    runtime: &Runtime,
    job_id: &str,
    record: &mut Record,
    cancel: &CancelToken,
) -> Result<(), ScrapeError> {
    record.start();

    let website = record.website.clone();
    if website.is_empty() {
        return Err(ScrapeError::new("config_error", "no website provided"));
    }

    check_canceled(cancel)?;
    emit(runtime, job_id, JobPhase::Discovery, PhaseStatus::Started, "discovering pages").await;
    let discovered = discovery::discover(&runtime.http, &website, &runtime.config.discovery)
        .await
        .map_err(|e| ScrapeError::new("discovery_error", e.message))?;
    record.normalized_origin = discovered.first().map(|d| d.url.clone());
    emit(
        runtime,
        job_id,
        JobPhase::Discovery,
        PhaseStatus::Completed,
        format!("found {} urls", discovered.len()),
    )
    .await;

    check_canceled(cancel)?;
    emit(runtime, job_id, JobPhase::Selection, PhaseStatus::Started, "selecting pages").await;
    let selection = selection::select(
        runtime.llm.as_ref(),
        &discovered,
        &runtime.config.selection,
        &runtime.config.prices,
        record,
    )
    .await;
    record.selection_method = Some(selection.method);
    emit(
        runtime,
        job_id,
        JobPhase::Selection,
        PhaseStatus::Completed,
        format!("selected {} urls via {:?}", selection.urls.len(), selection.method),
    )
    .await;

    check_canceled(cancel)?;
    emit(runtime, job_id, JobPhase::Extraction, PhaseStatus::Started, "extracting page content").await;
    let extraction_progress =
        ExtractionProgress { runtime, job_id, total: selection.urls.len(), done: AtomicUsize::new(0) };
    let pages = extract::extract_pages(
        runtime.http.as_ref(),
        Some(runtime.browser.as_ref()),
        &selection.urls,
        &runtime.config.extraction,
        Some(&extraction_progress),
    )
    .await;

    if extract::phase_failed(&pages) {
        return Err(ScrapeError::new("no_content", "no page yielded usable content"));
    }

    record.pages_crawled = pages.iter().filter(|p| p.success).map(|p| p.url.clone()).collect();
    record.crawl_depth = runtime.config.discovery.depth;
    for page in &pages {
        record.scraped_content_details.insert(page.url.clone(), page.cleaned_text.len());
    }
    emit(
        runtime,
        job_id,
        JobPhase::Extraction,
        PhaseStatus::Completed,
        format!("extracted {} pages", record.pages_crawled.len()),
    )
    .await;

    check_canceled(cancel)?;
    emit(runtime, job_id, JobPhase::Aggregation, PhaseStatus::Started, "aggregating intelligence").await;
    let aggregated_ok = aggregate::aggregate(
        runtime.llm.as_ref(),
        record,
        &pages,
        &runtime.config.aggregation,
        &runtime.config.prices,
    )
    .await;
    if !aggregated_ok {
        warn!(job_id, "aggregation degraded, continuing with empty fields");
        record.scrape_error = Some(ScrapeError::new("llm_error", "aggregation failed after retry"));
    }
    emit(runtime, job_id, JobPhase::Aggregation, PhaseStatus::Completed, "aggregation done").await;

    check_canceled(cancel)?;
    emit(runtime, job_id, JobPhase::Social, PhaseStatus::Started, "scanning for social links").await;
    let link_sets = pages
        .iter()
        .filter(|p| p.success)
        .map(|p| social::extract_from_page(&p.raw_html, &p.url, &runtime.config.social));
    record.social_media = social::merge_links(link_sets);
    emit(
        runtime,
        job_id,
        JobPhase::Social,
        PhaseStatus::Completed,
        format!("found {} social links", record.social_media.len()),
    )
    .await;

    check_canceled(cancel)?;
    emit(runtime, job_id, JobPhase::Embedding, PhaseStatus::Started, "building embedding").await;
    let text = embedding::canonical_text(
        &record.name,
        record.industry.as_deref().unwrap_or_default(),
        record.description.as_deref().unwrap_or_default(),
        record.value_proposition.as_deref().unwrap_or_default(),
        &record.key_services,
    );
    match embedding::embed_with_retry(runtime.embedding_client(), &runtime.config.embedding, &text).await {
        Ok(vector) => {
            record.embedding = Some(vector);
            emit(runtime, job_id, JobPhase::Embedding, PhaseStatus::Completed, "embedding built").await;
        }
        Err(e) => {
            warn!(job_id, error = %e, "embedding failed after retries");
            record.scrape_error = Some(ScrapeError::new("embedding_error", e.to_string()));
            emit(runtime, job_id, JobPhase::Embedding, PhaseStatus::Failed, e.to_string()).await;
        }
    }

    info!(job_id, "pipeline finished");
    Ok(())
}

fn check_canceled(cancel: &CancelToken) -> Result<(), ScrapeError> {
    if cancel.is_canceled() {
        Err(ScrapeError::new("canceled", "job canceled by caller"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_starts_uncanceled() {
        let token = CancelToken::new();
        assert!(!token.is_canceled());
        token.cancel();
        assert!(token.is_canceled());
    }
}
