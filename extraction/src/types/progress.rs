//! Progress events emitted by a pipeline onto the progress bus (C12).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One of the five ordered extraction phases, plus the embedding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Discovery,
    Selection,
    Extraction,
    Aggregation,
    Social,
    Embedding,
}

/// Status of a phase transition within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Started,
    Progress,
    Completed,
    Failed,
}

/// A single progress event, keyed by job-id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: String,
    pub phase: JobPhase,
    pub status: PhaseStatus,
    pub message: String,
    pub ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub counters: HashMap<String, i64>,
}

impl ProgressEvent {
    pub fn new(job_id: impl Into<String>, phase: JobPhase, status: PhaseStatus, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            phase,
            status,
            message: message.into(),
            ts: Utc::now(),
            counters: HashMap::new(),
        }
    }

    pub fn with_counter(mut self, key: impl Into<String>, value: i64) -> Self {
        self.counters.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_counters() {
        let event = ProgressEvent::new("job-1", JobPhase::Extraction, PhaseStatus::Progress, "3/10 pages")
            .with_counter("done", 3)
            .with_counter("total", 10);
        assert_eq!(event.counters.get("done"), Some(&3));
        assert_eq!(event.job_id, "job-1");
    }
}
