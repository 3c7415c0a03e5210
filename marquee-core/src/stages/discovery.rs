use async_trait::async_trait;

use marquee_model::Film;

use crate::error::Result;
use crate::extract::CatalogEntry;
use crate::pipeline::Stage;

/// Turns a catalog listing row into a candidate film.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscoveryStage;

#[async_trait]
impl Stage for DiscoveryStage {
    type Input = CatalogEntry;
    type Output = Film;

    fn name(&self) -> &'static str {
        "discovery"
    }

    async fn process(&self, entry: CatalogEntry) -> Result<Vec<Film>> {
        tracing::trace!(
            target: "marquee::stage",
            source_id = %entry.source_id,
            title = %entry.title,
            "discovered"
        );
        Ok(vec![Film::candidate(entry.source_id, entry.title, Some(entry.year))])
    }
}
