//! Progress Bus (C12): append-only per-job event store with at-least-once
//! fan-out to subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::types::ProgressEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Thread-safe store of progress events, keyed by job id, with a broadcast
/// channel for live subscribers. Events already appended are retained even
/// after all subscribers have disconnected.
pub struct ProgressBus {
    history: RwLock<HashMap<String, Vec<ProgressEvent>>>,
    sender: broadcast::Sender<ProgressEvent>,
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { history: RwLock::new(HashMap::new()), sender }
    }

    /// Append an event to the job's history and fan it out to subscribers.
    /// At-least-once: a slow subscriber may miss live events but can always
    /// recover the full history via `history_for`.
    pub async fn publish(&self, event: ProgressEvent) {
        let mut history = self.history.write().await;
        history.entry(event.job_id.clone()).or_default().push(event.clone());
        drop(history);
        let _ = self.sender.send(event);
    }

    pub async fn history_for(&self, job_id: &str) -> Vec<ProgressEvent> {
        self.history.read().await.get(job_id).cloned().unwrap_or_default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

pub type SharedProgressBus = Arc<ProgressBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobPhase, PhaseStatus};

    #[tokio::test]
    async fn publish_appends_to_history() {
        let bus = ProgressBus::new();
        let event = ProgressEvent::new("job-1", JobPhase::Discovery, PhaseStatus::Started, "discovery started");
        bus.publish(event).await;
        let history = bus.history_for("job-1").await;
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = ProgressBus::new();
        let mut rx = bus.subscribe();
        let event = ProgressEvent::new("job-2", JobPhase::Selection, PhaseStatus::Completed, "selection done");
        bus.publish(event.clone()).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.job_id, "job-2");
    }
}
