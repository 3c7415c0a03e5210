//! Stage abstraction and the runtime that drives stages as worker pools.

pub mod outlet;
pub mod progress;
pub mod runtime;

use async_trait::async_trait;

use crate::error::Result;
use crate::queue::WorkItem;

pub use outlet::{Completion, CompletionLog, EntityKind, Outlet};
pub use progress::{ProgressReporter, QueueDepth};
pub use runtime::PipelineRuntime;

/// One transformation step of the crawl.
///
/// A stage consumes a single input item and returns everything it produces;
/// routing those outputs to queues is the job of the [`Outlet`] the stage is
/// wired to. An `Err` drops the item.
#[async_trait]
pub trait Stage: Send + Sync {
    type Input: WorkItem;
    type Output: Send + 'static;

    fn name(&self) -> &'static str;

    async fn process(&self, item: Self::Input) -> Result<Vec<Self::Output>>;
}
