use std::sync::Arc;

use async_trait::async_trait;

use marquee_model::{FILM_POLICY, Film, FilmPages, Person, PersonKey};

use super::StageContext;
use crate::error::Result;
use crate::extract::{
    ExtractError, TitleDetails, catalog_revenue, credited_actors, parse_title_page,
};
use crate::pipeline::{Outlet, Stage};
use crate::queue::DedupQueue;
use crate::resolution::{FieldFailure, FieldOutcome, Resolver};

/// What a detail fetch produces: the film itself and one pending person per
/// cast or director reference.
#[derive(Debug, Clone)]
pub enum FilmDetailOutput {
    Film(Film),
    Person(Person),
}

/// Routes detail output to the film persist queue and the person queue.
#[derive(Debug, Clone)]
pub struct FilmDetailOutlet {
    pub films: Arc<DedupQueue<Film>>,
    pub persons: Arc<DedupQueue<Person>>,
}

impl Outlet<FilmDetailOutput> for FilmDetailOutlet {
    fn forward(&self, item: FilmDetailOutput) {
        match item {
            FilmDetailOutput::Film(film) => self.films.forward(film),
            FilmDetailOutput::Person(person) => self.persons.forward(person),
        }
    }
}

/// Fetches the title, credits and catalog pages of a film and fills in every
/// detail field.
#[derive(Debug, Clone)]
pub struct FilmDetailStage {
    context: StageContext,
}

impl FilmDetailStage {
    pub fn new(context: StageContext) -> Self {
        Self { context }
    }

    async fn page(&self, url: Option<String>) -> FieldOutcome<Option<String>> {
        match url {
            Some(url) => Ok(Some(self.context.fetcher.fetch_body(&url).await?)),
            None => Err(FieldFailure::new("film has no id on that site")),
        }
    }

    async fn fetch_pages(&self, film: &Film, resolver: &mut Resolver) -> FilmPages {
        let sites = &self.context.sites;
        let (title_url, credits_url) = if film.is_resolved() {
            (
                Some(sites.index_title(&film.id)),
                Some(sites.index_credits(&film.id)),
            )
        } else {
            (None, None)
        };
        let source_url = (!film.source_id.is_empty()).then(|| sites.catalog_film(&film.source_id));

        let (title_page, credits_page, source_page) = tokio::join!(
            self.page(title_url),
            self.page(credits_url),
            self.page(source_url),
        );

        FilmPages {
            title_page: resolver.resolve(&FILM_POLICY.title_page, title_page),
            credits_page: resolver.resolve(&FILM_POLICY.credits_page, credits_page),
            source_page: resolver.resolve(&FILM_POLICY.source_page, source_page),
        }
    }

    fn apply_details(&self, film: &mut Film, pages: &FilmPages, resolver: &mut Resolver) {
        let details = match pages.title_page.as_deref() {
            Some(html) => parse_title_page(html),
            None => unavailable(ExtractError::Missing("title page")),
        };

        film.critic_score =
            resolver.resolve(&FILM_POLICY.critic_score, outcome(details.critic_score));
        film.audience_score =
            resolver.resolve(&FILM_POLICY.audience_score, outcome(details.audience_score));
        film.vote_count = resolver.resolve(&FILM_POLICY.vote_count, outcome(details.vote_count));
        film.runtime_minutes =
            resolver.resolve(&FILM_POLICY.runtime_minutes, outcome(details.runtime_minutes));
        film.content_rating =
            resolver.resolve(&FILM_POLICY.content_rating, outcome(details.content_rating));
        film.budget = resolver.resolve(&FILM_POLICY.budget, outcome(details.budget));
        film.director =
            resolver.resolve(&FILM_POLICY.director, outcome(details.director.map(Some)));

        // Calendar fields stand or fall with the release date.
        match outcome(details.release_date) {
            Ok(date) => film.set_release_date(date),
            Err(failure) => {
                film.release_date = resolver.fail(&FILM_POLICY.release_date, failure.clone());
                film.release_month = resolver.fail(&FILM_POLICY.release_month, failure.clone());
                film.release_day = resolver.fail(&FILM_POLICY.release_day, failure.clone());
                film.release_weekday = resolver.fail(&FILM_POLICY.release_weekday, failure);
            }
        }

        let actors = match pages.credits_page.as_deref() {
            Some(html) => outcome(credited_actors(html)),
            None => Err(FieldFailure::new("credits page unavailable")),
        };
        film.actors = resolver.resolve(&FILM_POLICY.actors, actors);

        let revenue = match pages.source_page.as_deref() {
            Some(html) => outcome(catalog_revenue(html, self.context.config.revenue_priority)),
            None => Err(FieldFailure::new("catalog page unavailable")),
        };
        film.revenue = resolver.resolve(&FILM_POLICY.revenue, revenue);
    }
}

fn outcome<T>(result: std::result::Result<T, ExtractError>) -> FieldOutcome<T> {
    result.map_err(FieldFailure::from)
}

fn unavailable(err: ExtractError) -> TitleDetails {
    TitleDetails {
        audience_score: Err(err.clone()),
        critic_score: Err(err.clone()),
        vote_count: Err(err.clone()),
        runtime_minutes: Err(err.clone()),
        content_rating: Err(err.clone()),
        budget: Err(err.clone()),
        release_date: Err(err.clone()),
        director: Err(err),
    }
}

#[async_trait]
impl Stage for FilmDetailStage {
    type Input = Film;
    type Output = FilmDetailOutput;

    fn name(&self) -> &'static str {
        "film_detail"
    }

    async fn process(&self, mut film: Film) -> Result<Vec<FilmDetailOutput>> {
        let mut resolver = Resolver::new(film.key());
        let pages = self.fetch_pages(&film, &mut resolver).await;
        self.apply_details(&mut film, &pages, &mut resolver);
        film.pages = Some(pages);
        film.failed |= resolver.failed();

        tracing::debug!(
            target: "marquee::stage",
            film = %film.key(),
            failed = film.failed,
            fallbacks = resolver.failures().len(),
            actors = film.actors.len(),
            "film details resolved"
        );

        let mut outputs: Vec<FilmDetailOutput> = film
            .person_keys()
            .into_iter()
            .map(|key: PersonKey| FilmDetailOutput::Person(Person::pending(key)))
            .collect();
        outputs.push(FilmDetailOutput::Film(film));
        Ok(outputs)
    }
}
