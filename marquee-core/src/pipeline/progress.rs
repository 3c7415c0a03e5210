use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::CompletionLog;
use crate::queue::{DedupQueue, WorkItem, WorkTracker};

/// Type-erased view of a queue's depth.
pub trait QueueDepth: Send + Sync {
    fn queue_name(&self) -> &'static str;
    fn depth(&self) -> usize;
}

impl<T: WorkItem> QueueDepth for DedupQueue<T> {
    fn queue_name(&self) -> &'static str {
        self.name()
    }

    fn depth(&self) -> usize {
        self.size()
    }
}

/// Periodically logs queue depths and completion counters while crawling.
pub struct ProgressReporter {
    queues: Vec<Arc<dyn QueueDepth>>,
    tracker: Arc<WorkTracker>,
    completions: Arc<CompletionLog>,
    interval: Duration,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("queues", &self.queues.len())
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl ProgressReporter {
    pub fn new(
        queues: Vec<Arc<dyn QueueDepth>>,
        tracker: Arc<WorkTracker>,
        completions: Arc<CompletionLog>,
        interval: Duration,
    ) -> Self {
        Self {
            queues,
            tracker,
            completions,
            interval,
        }
    }

    pub fn depths(&self) -> Vec<(&'static str, usize)> {
        self.queues
            .iter()
            .map(|queue| (queue.queue_name(), queue.depth()))
            .collect()
    }

    pub fn report(&self) {
        let depths = self
            .depths()
            .iter()
            .map(|(name, depth)| format!("{name}={depth}"))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(
            target: "marquee::queue",
            outstanding = self.tracker.outstanding(),
            films = self.completions.films(),
            persons = self.completions.persons(),
            failed = self.completions.failed(),
            "queues: {depths}"
        );
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.report(),
            }
        }
    }
}
