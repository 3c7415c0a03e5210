//! Crawl driver: seeds the queues, walks the catalog and runs every stage
//! until no work is left.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use marquee_model::{FILMS, FILMS_AGG, Film, FilmKey, PERSONS, Person};

use crate::error::{MarqueeError, Result};
use crate::extract::{CatalogEntry, catalog_rows, default_catalog_letters};
use crate::pipeline::{CompletionLog, PipelineRuntime, ProgressReporter, QueueDepth};
use crate::queue::{DedupQueue, WorkTracker};
use crate::registry::Registry;
use crate::stages::{
    DiscoveryStage, FilmDetailOutlet, FilmDetailStage, IdentityResolutionStage,
    PersistFilmStage, PersistPersonStage, PersonDetailStage, StageContext,
};
use crate::store::DocumentStore;

/// Letter whose listing fits on a single page.
const NUMERIC_LETTER: &str = "NUM";

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Drop every collection before starting instead of resuming.
    pub fresh: bool,
    pub letters: Vec<String>,
    /// How long each worker gets to finish its current item on shutdown.
    pub shutdown_grace: Duration,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            fresh: false,
            letters: default_catalog_letters(),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub run_id: Uuid,
    pub catalog_entries: usize,
    pub films: usize,
    pub persons: usize,
    pub failed: usize,
    /// Records carried over from earlier runs.
    pub resumed_films: usize,
    pub resumed_persons: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Every dedup queue of one crawl, in pipeline order.
#[derive(Debug)]
pub struct CrawlQueues {
    pub catalog: Arc<DedupQueue<CatalogEntry>>,
    pub candidates: Arc<DedupQueue<Film>>,
    pub resolved: Arc<DedupQueue<Film>>,
    pub persons: Arc<DedupQueue<Person>>,
    pub persist_films: Arc<DedupQueue<Film>>,
    pub persist_persons: Arc<DedupQueue<Person>>,
}

impl CrawlQueues {
    /// Builds the queues with everything `registry` already holds marked as
    /// seen, so a resumed crawl only admits new work.
    pub fn seeded(registry: &Registry, tracker: &Arc<WorkTracker>) -> Self {
        let sources = registry.source_ids();
        let candidate_keys: Vec<String> = sources
            .iter()
            .map(|id| FilmKey::Unresolved(id.clone()).to_string())
            .collect();
        let source_ids: Vec<String> = sources.iter().map(ToString::to_string).collect();
        let film_keys = registry.film_keys();
        let person_keys = registry.person_keys();

        Self {
            catalog: Arc::new(DedupQueue::with_seen("catalog", Arc::clone(tracker), source_ids)),
            candidates: Arc::new(DedupQueue::with_seen(
                "candidates",
                Arc::clone(tracker),
                candidate_keys,
            )),
            resolved: Arc::new(DedupQueue::with_seen(
                "resolved",
                Arc::clone(tracker),
                film_keys.clone(),
            )),
            persons: Arc::new(DedupQueue::with_seen(
                "persons",
                Arc::clone(tracker),
                person_keys.clone(),
            )),
            persist_films: Arc::new(DedupQueue::with_seen(
                "persist_films",
                Arc::clone(tracker),
                film_keys,
            )),
            persist_persons: Arc::new(DedupQueue::with_seen(
                "persist_persons",
                Arc::clone(tracker),
                person_keys,
            )),
        }
    }

    fn depths(&self) -> Vec<Arc<dyn QueueDepth>> {
        vec![
            Arc::clone(&self.catalog) as Arc<dyn QueueDepth>,
            Arc::clone(&self.candidates) as Arc<dyn QueueDepth>,
            Arc::clone(&self.resolved) as Arc<dyn QueueDepth>,
            Arc::clone(&self.persons) as Arc<dyn QueueDepth>,
            Arc::clone(&self.persist_films) as Arc<dyn QueueDepth>,
            Arc::clone(&self.persist_persons) as Arc<dyn QueueDepth>,
        ]
    }
}

#[derive(Debug)]
pub struct Crawler {
    context: StageContext,
    store: Arc<dyn DocumentStore>,
    options: CrawlOptions,
}

impl Crawler {
    pub fn new(
        context: StageContext,
        store: Arc<dyn DocumentStore>,
        options: CrawlOptions,
    ) -> Self {
        Self {
            context,
            store,
            options,
        }
    }

    /// Runs one crawl to quiescence or until `shutdown` fires. Returns the
    /// report and the registry of everything persisted, earlier runs
    /// included, ready for aggregation.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(CrawlReport, Registry)> {
        let run_id = Uuid::now_v7();
        self.run_inner(run_id, shutdown)
            .instrument(tracing::info_span!("crawl", %run_id))
            .await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        shutdown: CancellationToken,
    ) -> Result<(CrawlReport, Registry)> {
        let started = Instant::now();

        if self.options.fresh {
            for collection in [FILMS, PERSONS, FILMS_AGG] {
                self.store.drop_collection(collection).await?;
            }
            tracing::info!(target: "marquee::store", "dropped collections for a fresh crawl");
        }

        let registry = Arc::new(Registry::load(self.store.as_ref()).await?);
        let resumed_films = registry.film_count();
        let resumed_persons = registry.person_count();

        let tracker = WorkTracker::new();
        let queues = CrawlQueues::seeded(&registry, &tracker);
        let completions = CompletionLog::new();
        let runtime = PipelineRuntime::new(shutdown.child_token());

        self.spawn_stages(&runtime, &queues, &registry, &completions).await;
        let reporter = ProgressReporter::new(
            queues.depths(),
            Arc::clone(&tracker),
            Arc::clone(&completions),
            self.context.config.progress_interval(),
        );
        runtime.spawn_task(|token| reporter.run(token)).await;

        let dangling = registry.dangling_person_keys();
        if !dangling.is_empty() {
            tracing::info!(
                target: "marquee::queue",
                count = dangling.len(),
                "re-enqueueing people referenced by persisted films"
            );
        }
        for key in dangling {
            queues.persons.enqueue_if_new(Person::pending(key));
        }

        let catalog_entries = {
            let _discovering = tracker.hold();
            self.discover(&queues.catalog, &shutdown).await
        };
        tracing::info!(target: "marquee::queue", catalog_entries, "catalog walk finished");

        let cancelled = tokio::select! {
            _ = tracker.wait_quiescent() => false,
            _ = shutdown.cancelled() => true,
        };
        if cancelled {
            tracing::warn!(
                target: "marquee::queue",
                outstanding = tracker.outstanding(),
                "crawl cancelled before quiescence"
            );
        }
        runtime.shutdown(self.options.shutdown_grace).await;

        let report = CrawlReport {
            run_id,
            catalog_entries,
            films: completions.films(),
            persons: completions.persons(),
            failed: completions.failed(),
            resumed_films,
            resumed_persons,
            cancelled,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            target: "marquee::stage",
            films = report.films,
            persons = report.persons,
            failed = report.failed,
            elapsed = ?report.elapsed,
            "crawl finished"
        );

        let registry = match Arc::try_unwrap(registry) {
            Ok(registry) => registry,
            Err(_) => {
                tracing::warn!(
                    target: "marquee::stage",
                    "workers still hold the registry; reloading it from the store"
                );
                Registry::load(self.store.as_ref()).await?
            }
        };
        Ok((report, registry))
    }

    async fn spawn_stages(
        &self,
        runtime: &PipelineRuntime,
        queues: &CrawlQueues,
        registry: &Arc<Registry>,
        completions: &Arc<CompletionLog>,
    ) {
        let workers = &self.context.config.workers;

        runtime
            .spawn_stage(
                Arc::new(DiscoveryStage),
                Arc::clone(&queues.catalog),
                Arc::clone(&queues.candidates),
                workers.discovery,
            )
            .await;
        runtime
            .spawn_stage(
                Arc::new(IdentityResolutionStage::new(self.context.clone())),
                Arc::clone(&queues.candidates),
                Arc::clone(&queues.resolved),
                workers.identity,
            )
            .await;
        runtime
            .spawn_stage(
                Arc::new(FilmDetailStage::new(self.context.clone())),
                Arc::clone(&queues.resolved),
                FilmDetailOutlet {
                    films: Arc::clone(&queues.persist_films),
                    persons: Arc::clone(&queues.persons),
                },
                workers.film_detail,
            )
            .await;
        runtime
            .spawn_stage(
                Arc::new(PersonDetailStage::new(self.context.clone())),
                Arc::clone(&queues.persons),
                Arc::clone(&queues.persist_persons),
                workers.person_detail,
            )
            .await;
        runtime
            .spawn_stage(
                Arc::new(PersistFilmStage::new(Arc::clone(&self.store), Arc::clone(registry))),
                Arc::clone(&queues.persist_films),
                Arc::clone(completions),
                workers.persist_film,
            )
            .await;
        runtime
            .spawn_stage(
                Arc::new(PersistPersonStage::new(Arc::clone(&self.store), Arc::clone(registry))),
                Arc::clone(&queues.persist_persons),
                Arc::clone(completions),
                workers.persist_person,
            )
            .await;
    }

    /// Walks every configured letter page by page until a page yields no
    /// rows. Returns how many new entries were admitted.
    async fn discover(
        &self,
        catalog: &DedupQueue<CatalogEntry>,
        shutdown: &CancellationToken,
    ) -> usize {
        let mut admitted = 0;
        for letter in &self.options.letters {
            let mut page = 1;
            loop {
                if shutdown.is_cancelled() {
                    return admitted;
                }
                let url = self.context.sites.catalog_listing(letter, page);
                let rows = match self.context.fetcher.fetch_body(&url).await {
                    Ok(body) => catalog_rows(&body),
                    Err(err) => {
                        tracing::warn!(
                            target: "marquee::stage",
                            %letter,
                            page,
                            error = %err,
                            "catalog page unavailable"
                        );
                        break;
                    }
                };
                if rows.is_empty() {
                    break;
                }
                let found = rows.len();
                let new = rows
                    .into_iter()
                    .filter(|entry| catalog.enqueue_if_new(entry.clone()))
                    .count();
                admitted += new;
                tracing::debug!(
                    target: "marquee::queue",
                    %letter,
                    page,
                    found,
                    new,
                    "catalog page"
                );

                if letter == NUMERIC_LETTER {
                    break;
                }
                page += 1;
            }
        }
        admitted
    }
}

/// Fails with [`MarqueeError::Cancelled`] when `report` describes an
/// interrupted crawl.
pub fn ensure_completed(report: &CrawlReport) -> Result<()> {
    if report.cancelled {
        return Err(MarqueeError::Cancelled(format!(
            "crawl {} stopped before all work was done",
            report.run_id
        )));
    }
    Ok(())
}
