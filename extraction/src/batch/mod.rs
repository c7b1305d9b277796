//! Batch Supervisor (C11): admits up to K concurrent jobs against the
//! shared `Runtime`, trips a circuit breaker after consecutive failures,
//! and delivers results tagged by input index in completion order.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::warn;

use crate::config::BatchConfig;
use crate::pipeline::{self, CancelToken};
use crate::runtime::Runtime;
use crate::types::record::{CompanyInput, Record, ScrapeStatus};

/// One batch member's result, tagged with its position in the input list.
#[derive(Debug, Clone)]
pub struct BatchItemResult {
    pub index: usize,
    pub record: Record,
}

/// Circuit breaker tripped after `threshold` consecutive job failures;
/// resets to zero on any success.
struct CircuitBreaker {
    threshold: u32,
    consecutive_failures: AtomicU32,
    tripped: std::sync::atomic::AtomicBool,
}

impl CircuitBreaker {
    fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive_failures: AtomicU32::new(0),
            tripped: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn record(&self, success: bool) {
        if success {
            self.consecutive_failures.store(0, Ordering::SeqCst);
        } else {
            let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
            if failures >= self.threshold {
                self.tripped.store(true, Ordering::SeqCst);
            }
        }
    }

    fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }
}

/// Run a batch of company inputs against the shared runtime, admitting up
/// to `config.concurrency` jobs at once. Each job checks the circuit
/// breaker only when a concurrency slot actually opens for it, so a job
/// already running is never skipped, but a job that hasn't started yet is
/// skipped (returned as `failed` with kind `circuit_open`) the moment a
/// prior completion trips the breaker.
pub async fn run_batch(runtime: &Runtime, inputs: Vec<CompanyInput>, config: &BatchConfig) -> Vec<BatchItemResult> {
    let breaker = Arc::new(CircuitBreaker::new(config.consecutive_failure_threshold));
    let concurrency = config.concurrency.max(1);
    let total = inputs.len();

    let mut results: Vec<Option<BatchItemResult>> = (0..total).map(|_| None).collect();
    let mut completed = 0usize;

    let mut jobs = stream::iter(inputs.into_iter().enumerate())
        .map(|(index, input)| {
            let breaker = breaker.clone();
            async move {
                if breaker.is_tripped() {
                    return BatchItemResult { index, record: circuit_open_record(&input) };
                }

                let record = pipeline::run_extraction(runtime, input, CancelToken::new()).await;
                let success = matches!(record.scrape_status, ScrapeStatus::Success | ScrapeStatus::Partial);
                breaker.record(success);
                BatchItemResult { index, record }
            }
        })
        .buffer_unordered(concurrency);

    while let Some(result) = jobs.next().await {
        completed += 1;
        if completed % config.progress_every == 0 {
            warn!(completed, total, "batch progress");
        }
        let index = result.index;
        results[index] = Some(result);
    }

    results.into_iter().enumerate().map(|(index, r)| r.unwrap_or_else(|| BatchItemResult {
        index,
        record: circuit_open_record(&CompanyInput::new("unknown")),
    })).collect()
}

fn circuit_open_record(input: &CompanyInput) -> Record {
    let mut record = Record::new(input);
    record.finish_failed(crate::types::record::ScrapeError::new(
        "circuit_open",
        "batch circuit breaker tripped before this job started",
    ));
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_breaker_trips_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3);
        breaker.record(false);
        breaker.record(false);
        assert!(!breaker.is_tripped());
        breaker.record(false);
        assert!(breaker.is_tripped());
    }

    #[test]
    fn circuit_breaker_resets_on_success() {
        let breaker = CircuitBreaker::new(3);
        breaker.record(false);
        breaker.record(false);
        breaker.record(true);
        breaker.record(false);
        breaker.record(false);
        assert!(!breaker.is_tripped());
    }
}
