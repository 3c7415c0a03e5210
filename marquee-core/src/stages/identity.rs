use async_trait::async_trait;

use marquee_model::{FILM_POLICY, Film, FilmId};

use super::StageContext;
use crate::error::Result;
use crate::extract::{pick_match, search_results};
use crate::pipeline::Stage;
use crate::resolution::{FieldFailure, FieldOutcome, Resolver};

/// Matches a candidate against the film index by title and year.
///
/// A miss leaves the canonical id empty and the film FAILED; the film still
/// moves on so it is persisted with defaults.
#[derive(Debug, Clone)]
pub struct IdentityResolutionStage {
    context: StageContext,
}

impl IdentityResolutionStage {
    pub fn new(context: StageContext) -> Self {
        Self { context }
    }

    async fn search(&self, film: &Film) -> FieldOutcome<FilmId> {
        let url = self.context.sites.index_search(&film.source_title);
        let body = self.context.fetcher.fetch_body(&url).await?;
        let results = search_results(&body);
        pick_match(&results, film.source_year, &self.context.config).ok_or_else(|| {
            FieldFailure::new(format!(
                "no title among {} results matched {:?} ({:?})",
                results.len(),
                film.source_title,
                film.source_year
            ))
        })
    }
}

#[async_trait]
impl Stage for IdentityResolutionStage {
    type Input = Film;
    type Output = Film;

    fn name(&self) -> &'static str {
        "identity"
    }

    async fn process(&self, mut film: Film) -> Result<Vec<Film>> {
        let mut resolver = Resolver::new(film.key());
        let outcome = self.search(&film).await;
        film.id = resolver.resolve(&FILM_POLICY.id, outcome);
        film.failed |= resolver.failed();

        tracing::debug!(
            target: "marquee::stage",
            source_id = %film.source_id,
            id = %film.id,
            resolved = film.is_resolved(),
            "identity resolution"
        );
        Ok(vec![film])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use marquee_model::SourceId;

    use super::*;
    use crate::config::PipelineConfig;
    use crate::extract::SourceSites;
    use crate::fetch::InMemoryFetcher;

    const RESULTS: &str = r#"
        <div class="findSection"><h3 class="findSectionHeader">Titles</h3>
          <table class="findList">
            <tr><td class="result_text"><a href="/title/tt0073195/">Jaws</a> (1975)</td></tr>
          </table>
        </div>"#;

    fn stage(fetcher: InMemoryFetcher) -> IdentityResolutionStage {
        IdentityResolutionStage::new(StageContext::new(
            Arc::new(fetcher),
            SourceSites::default(),
            PipelineConfig::default(),
        ))
    }

    #[tokio::test]
    async fn resolves_matching_title() {
        let sites = SourceSites::default();
        let fetcher = InMemoryFetcher::new().with_page(sites.index_search("Jaws"), RESULTS);
        let candidate = Film::candidate(SourceId::new("jaws"), "Jaws", Some(1976));

        let films = stage(fetcher).process(candidate).await.expect("process");
        assert_eq!(films[0].id, FilmId::new("tt0073195"));
        assert!(!films[0].failed);
    }

    #[tokio::test]
    async fn miss_is_forwarded_as_failed() {
        let sites = SourceSites::default();
        let fetcher = InMemoryFetcher::new().with_page(sites.index_search("Jaws"), RESULTS);
        let candidate = Film::candidate(SourceId::new("jaws"), "Jaws", Some(1990));

        let films = stage(fetcher).process(candidate).await.expect("process");
        assert_eq!(films.len(), 1);
        assert!(films[0].id.is_empty());
        assert!(films[0].failed);
    }

    #[tokio::test]
    async fn fetch_failure_is_a_miss() {
        let candidate = Film::candidate(SourceId::new("gone"), "Gone", Some(2000));
        let films = stage(InMemoryFetcher::new()).process(candidate).await.expect("process");
        assert!(films[0].failed);
        assert!(!films[0].is_resolved());
    }
}
