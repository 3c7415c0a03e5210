use async_trait::async_trait;

use marquee_model::{PERSON_POLICY, Person};

use super::StageContext;
use crate::error::Result;
use crate::extract::{ExtractError, PersonDetails, parse_person_page};
use crate::pipeline::Stage;
use crate::resolution::{FieldFailure, FieldOutcome, Resolver};

/// Fetches a person page and reads the name, birth date and the filmography
/// matching the record's role.
#[derive(Debug, Clone)]
pub struct PersonDetailStage {
    context: StageContext,
}

impl PersonDetailStage {
    pub fn new(context: StageContext) -> Self {
        Self { context }
    }

    async fn page(&self, person: &Person) -> FieldOutcome<Option<String>> {
        if person.id.is_empty() {
            return Err(FieldFailure::new("person has no id"));
        }
        let url = self.context.sites.index_person(&person.id);
        Ok(Some(self.context.fetcher.fetch_body(&url).await?))
    }
}

#[async_trait]
impl Stage for PersonDetailStage {
    type Input = Person;
    type Output = Person;

    fn name(&self) -> &'static str {
        "person_detail"
    }

    async fn process(&self, mut person: Person) -> Result<Vec<Person>> {
        let mut resolver = Resolver::new(person.key());
        if person.id.is_empty() {
            person.id = resolver.fail(&PERSON_POLICY.id, FieldFailure::new("empty person id"));
        }

        let outcome = self.page(&person).await;
        let page = resolver.resolve(&PERSON_POLICY.page, outcome);
        let details = match page.as_deref() {
            Some(html) => parse_person_page(html, person.role),
            None => {
                let missing = ExtractError::Missing("person page");
                PersonDetails {
                    name: Err(missing.clone()),
                    birth_date: Err(missing.clone()),
                    films: Err(missing),
                }
            }
        };

        person.name =
            resolver.resolve(&PERSON_POLICY.name, details.name.map_err(FieldFailure::from));
        person.birth_date = resolver.resolve(
            &PERSON_POLICY.birth_date,
            details.birth_date.map_err(FieldFailure::from),
        );
        let films =
            resolver.resolve(&PERSON_POLICY.films, details.films.map_err(FieldFailure::from));
        person.set_films(films);
        person.page = page;
        person.failed |= resolver.failed();

        tracing::debug!(
            target: "marquee::stage",
            person = %person.key(),
            failed = person.failed,
            films = person.films.len(),
            "person details resolved"
        );
        Ok(vec![person])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use marquee_model::{FilmId, PersonId, PersonKey, sentinel_date};

    use super::*;
    use crate::config::PipelineConfig;
    use crate::extract::SourceSites;
    use crate::fetch::InMemoryFetcher;

    const PAGE: &str = r#"
        <html><body>
          <h1><span itemprop="name">Kathryn Bigelow</span></h1>
          <time itemprop="birthDate" datetime="1951-11-27"></time>
          <div id="filmo-head-actress">Actress</div>
          <div class="filmo-category-section">
            <div class="filmo-row" id="actress-tt0090000">Later (1990)</div>
            <div class="filmo-row" id="actress-tt0080000">Earlier (1980)</div>
          </div>
          <div id="filmo-head-director">Director</div>
          <div class="filmo-category-section">
            <div class="filmo-row" id="director-tt0887912">The Hurt Locker (2008)</div>
          </div>
        </body></html>"#;

    fn stage(fetcher: InMemoryFetcher) -> PersonDetailStage {
        PersonDetailStage::new(StageContext::new(
            Arc::new(fetcher),
            SourceSites::default(),
            PipelineConfig::default(),
        ))
    }

    fn fetcher() -> InMemoryFetcher {
        let sites = SourceSites::default();
        InMemoryFetcher::new().with_page(sites.index_person(&PersonId::new("nm0000941")), PAGE)
    }

    #[tokio::test]
    async fn cast_record_reads_acting_credits() {
        let person = Person::pending(PersonKey::cast("nm0000941"));
        let person = stage(fetcher()).process(person).await.expect("process").remove(0);

        assert!(!person.failed);
        assert_eq!(person.name, "Kathryn Bigelow");
        assert_eq!(person.birth_date, NaiveDate::from_ymd_opt(1951, 11, 27).expect("date"));
        assert_eq!(person.films, vec![FilmId::new("tt0080000"), FilmId::new("tt0090000")]);
        assert!(!person.films_sorted);
    }

    #[tokio::test]
    async fn director_record_reads_directing_credits() {
        let person = Person::pending(PersonKey::director("nm0000941"));
        let person = stage(fetcher()).process(person).await.expect("process").remove(0);

        assert_eq!(person.films, vec![FilmId::new("tt0887912")]);
        assert_eq!(person.key().to_string(), "director-nm0000941");
    }

    #[tokio::test]
    async fn unreachable_page_degrades_to_failed_sentinel_values() {
        let person = Person::pending(PersonKey::cast("nm404"));
        let person = stage(InMemoryFetcher::new())
            .process(person)
            .await
            .expect("process")
            .remove(0);

        assert!(person.failed);
        assert_eq!(person.birth_date, sentinel_date());
        assert!(person.films.is_empty());
        assert!(person.page.is_none());
    }
}
