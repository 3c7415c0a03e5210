use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{Outlet, Stage};
use crate::queue::{DedupQueue, WorkItem};

/// Owns the worker tasks of one crawl and their shared shutdown token.
pub struct PipelineRuntime {
    shutdown_token: CancellationToken,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for PipelineRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let worker_handle_count = self
            .worker_handles
            .try_lock()
            .map(|handles| handles.len())
            .unwrap_or_default();
        f.debug_struct("PipelineRuntime")
            .field("shutdown_cancelled", &self.shutdown_token.is_cancelled())
            .field("worker_handle_count", &worker_handle_count)
            .finish()
    }
}

impl Default for PipelineRuntime {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl PipelineRuntime {
    /// `shutdown_token` may be a child of a process-wide token so that an
    /// interrupt stops the workers.
    pub fn new(shutdown_token: CancellationToken) -> Self {
        Self {
            shutdown_token,
            worker_handles: Mutex::new(Vec::new()),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Spawns `workers` concurrent loops draining `input` through `stage`.
    ///
    /// Each loop dequeues an item, processes it, forwards every output and
    /// only then acks the item, so downstream work is always counted before
    /// its parent is released. Errors and panics in `process` drop the item
    /// and the loop carries on.
    pub async fn spawn_stage<S, O>(
        &self,
        stage: Arc<S>,
        input: Arc<DedupQueue<S::Input>>,
        outlet: O,
        workers: usize,
    ) where
        S: Stage + 'static,
        O: Outlet<S::Output> + Clone + 'static,
    {
        let mut handles = self.worker_handles.lock().await;
        for index in 0..workers.max(1) {
            let worker_id = format!("{}-w{}", stage.name(), index);
            let stage = Arc::clone(&stage);
            let input = Arc::clone(&input);
            let outlet = outlet.clone();
            let shutdown = self.shutdown_token.clone();

            handles.push(tokio::spawn(async move {
                run_worker(worker_id, stage, input, outlet, shutdown).await;
            }));
        }
    }

    /// Spawns an auxiliary task that runs until the shutdown token fires.
    pub async fn spawn_task<F, Fut>(&self, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.shutdown_token.clone()));
        self.worker_handles.lock().await.push(handle);
    }

    /// Cancels every worker and waits up to `grace` for each to finish its
    /// current item.
    pub async fn shutdown(&self, grace: Duration) {
        tracing::info!(target: "marquee::stage", "shutting down pipeline workers");
        self.shutdown_token.cancel();

        let handles = {
            let mut guard = self.worker_handles.lock().await;
            std::mem::take(&mut *guard)
        };

        for handle in handles {
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::warn!(target: "marquee::stage", "worker task failed: {err:?}")
                }
                Err(_) => {
                    tracing::warn!(
                        target: "marquee::stage",
                        "worker task timed out during shutdown"
                    )
                }
            }
        }
        tracing::info!(target: "marquee::stage", "pipeline shutdown complete");
    }
}

async fn run_worker<S, O>(
    worker_id: String,
    stage: Arc<S>,
    input: Arc<DedupQueue<S::Input>>,
    outlet: O,
    shutdown: CancellationToken,
) where
    S: Stage + 'static,
    O: Outlet<S::Output>,
{
    tracing::debug!(
        target: "marquee::stage",
        worker = %worker_id,
        queue = input.name(),
        "worker started"
    );
    loop {
        let item = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            item = input.dequeue() => item,
        };
        let Some(item) = item else {
            break;
        };

        let key = item.dedup_key();
        match AssertUnwindSafe(stage.process(item)).catch_unwind().await {
            Ok(Ok(outputs)) => {
                for output in outputs {
                    outlet.forward(output);
                }
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    target: "marquee::stage",
                    stage = stage.name(),
                    worker = %worker_id,
                    %key,
                    error = %err,
                    "item dropped"
                );
            }
            Err(panic) => {
                tracing::error!(
                    target: "marquee::stage",
                    stage = stage.name(),
                    worker = %worker_id,
                    %key,
                    panic = panic_message(panic.as_ref()),
                    "stage panicked, item dropped"
                );
            }
        }
        input.ack_done();
    }
    tracing::debug!(target: "marquee::stage", worker = %worker_id, "worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
