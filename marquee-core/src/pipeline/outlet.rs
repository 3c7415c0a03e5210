use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::queue::{DedupQueue, WorkItem};

/// Destination for a stage's outputs.
pub trait Outlet<T>: Send + Sync {
    fn forward(&self, item: T);
}

impl<T: WorkItem> Outlet<T> for DedupQueue<T> {
    fn forward(&self, item: T) {
        let key = item.dedup_key();
        if !self.enqueue_if_new(item) {
            tracing::trace!(
                target: "marquee::queue",
                queue = self.name(),
                %key,
                "already admitted"
            );
        }
    }
}

impl<T, O> Outlet<T> for Arc<O>
where
    O: Outlet<T> + ?Sized,
{
    fn forward(&self, item: T) {
        (**self).forward(item);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Film,
    Person,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Film => f.write_str("film"),
            EntityKind::Person => f.write_str("person"),
        }
    }
}

/// Lightweight token emitted once an entity is durably persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub kind: EntityKind,
    pub key: String,
    pub failed: bool,
}

/// Terminal sink counting persisted entities.
#[derive(Debug, Default)]
pub struct CompletionLog {
    films: AtomicUsize,
    persons: AtomicUsize,
    failed: AtomicUsize,
}

impl CompletionLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn films(&self) -> usize {
        self.films.load(Ordering::Relaxed)
    }

    pub fn persons(&self) -> usize {
        self.persons.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

impl Outlet<Completion> for CompletionLog {
    fn forward(&self, completion: Completion) {
        match completion.kind {
            EntityKind::Film => self.films.fetch_add(1, Ordering::Relaxed),
            EntityKind::Person => self.persons.fetch_add(1, Ordering::Relaxed),
        };
        if completion.failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!(
            target: "marquee::stage",
            kind = %completion.kind,
            key = %completion.key,
            failed = completion.failed,
            "persisted"
        );
    }
}
