//! Concrete crawl stages, in pipeline order.

mod discovery;
mod film_detail;
mod identity;
mod person_detail;
mod persist;

use std::fmt;
use std::sync::Arc;

use marquee_model::{Film, Person};

use crate::config::PipelineConfig;
use crate::extract::{CatalogEntry, SourceSites};
use crate::fetch::Fetcher;
use crate::queue::WorkItem;

pub use discovery::DiscoveryStage;
pub use film_detail::{FilmDetailOutlet, FilmDetailOutput, FilmDetailStage};
pub use identity::IdentityResolutionStage;
pub use person_detail::PersonDetailStage;
pub use persist::{PersistFilmStage, PersistPersonStage};

/// Collaborators shared by the fetching stages.
#[derive(Clone)]
pub struct StageContext {
    pub fetcher: Arc<dyn Fetcher>,
    pub sites: SourceSites,
    pub config: PipelineConfig,
}

impl fmt::Debug for StageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("fetcher", &self.fetcher)
            .field("sites", &self.sites)
            .finish_non_exhaustive()
    }
}

impl StageContext {
    pub fn new(fetcher: Arc<dyn Fetcher>, sites: SourceSites, config: PipelineConfig) -> Self {
        Self {
            fetcher,
            sites,
            config,
        }
    }
}

impl WorkItem for CatalogEntry {
    fn dedup_key(&self) -> String {
        self.source_id.to_string()
    }
}

/// Films are keyed by canonical id once resolved and by `source-<id>`
/// before that, so a candidate and its resolved form never collide.
impl WorkItem for Film {
    fn dedup_key(&self) -> String {
        self.key().to_string()
    }
}

/// Plain id for cast records, `director-<id>` for director records.
impl WorkItem for Person {
    fn dedup_key(&self) -> String {
        self.key().to_string()
    }
}
