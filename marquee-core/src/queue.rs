//! Deduplicating work queues and quiescence tracking.
//!
//! Each [`DedupQueue`] admits a key at most once over its lifetime. Admission
//! is a single atomic insert into the queue's seen set, so concurrent
//! producers racing on the same key see exactly one winner.
//!
//! All queues of one pipeline share a [`WorkTracker`]. A unit of work is
//! counted from the moment it is admitted until the worker that dequeued it
//! has forwarded its outputs and called [`DedupQueue::ack_done`]; outputs are
//! admitted (and counted) before the parent is acked, so the counter can only
//! reach zero when no queue holds an item and no worker holds one in flight.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashSet;
use tokio::sync::{Mutex, Notify, mpsc};

/// A payload that can travel through a [`DedupQueue`].
pub trait WorkItem: Send + 'static {
    /// Identity used for at-most-once admission.
    fn dedup_key(&self) -> String;
}

/// Outstanding-work counter shared by every queue in a pipeline.
#[derive(Default)]
pub struct WorkTracker {
    outstanding: AtomicUsize,
    idle: Notify,
}

impl fmt::Debug for WorkTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkTracker")
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

impl WorkTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn begin(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        let previous = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or_default();
        if previous <= 1 {
            self.idle.notify_waiters();
        }
    }

    /// Holds the pipeline open while a producer outside the stages (such as
    /// catalog discovery) is still feeding it.
    pub fn hold(self: &Arc<Self>) -> WorkGuard {
        self.begin();
        WorkGuard {
            tracker: Arc::clone(self),
        }
    }

    /// Resolves once no work is queued or in flight.
    pub async fn wait_quiescent(&self) {
        loop {
            let notified = self.idle.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Keeps a [`WorkTracker`] from reporting quiescence until dropped.
pub struct WorkGuard {
    tracker: Arc<WorkTracker>,
}

impl fmt::Debug for WorkGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkGuard").finish_non_exhaustive()
    }
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        self.tracker.finish();
    }
}

pub struct DedupQueue<T: WorkItem> {
    name: &'static str,
    seen: DashSet<String>,
    sender: mpsc::UnboundedSender<T>,
    receiver: Mutex<mpsc::UnboundedReceiver<T>>,
    depth: AtomicUsize,
    tracker: Arc<WorkTracker>,
}

impl<T: WorkItem> fmt::Debug for DedupQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedupQueue")
            .field("name", &self.name)
            .field("seen", &self.seen.len())
            .field("depth", &self.size())
            .finish()
    }
}

impl<T: WorkItem> DedupQueue<T> {
    pub fn new(name: &'static str, tracker: Arc<WorkTracker>) -> Self {
        Self::with_seen(name, tracker, std::iter::empty::<String>())
    }

    /// Builds a queue that already considers `seen` admitted, so a resumed
    /// run skips keys that were durably persisted before.
    pub fn with_seen<I, K>(name: &'static str, tracker: Arc<WorkTracker>, seen: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            name,
            seen: seen.into_iter().map(Into::into).collect(),
            sender,
            receiver: Mutex::new(receiver),
            depth: AtomicUsize::new(0),
            tracker,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Admits `item` unless its key was admitted before. Returns whether the
    /// item was enqueued.
    pub fn enqueue_if_new(&self, item: T) -> bool {
        let key = item.dedup_key();
        if !self.seen.insert(key) {
            return false;
        }
        self.tracker.begin();
        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(item).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            self.tracker.finish();
            tracing::error!(target: "marquee::queue", queue = self.name, "queue receiver closed");
            return false;
        }
        true
    }

    /// Waits for the next item. Cancel safe.
    pub async fn dequeue(&self) -> Option<T> {
        let mut receiver = self.receiver.lock().await;
        let item = receiver.recv().await;
        if item.is_some() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
        item
    }

    /// Marks one dequeued item as fully handled.
    pub fn ack_done(&self) {
        self.tracker.finish();
    }

    pub fn has_seen(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn size(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}
