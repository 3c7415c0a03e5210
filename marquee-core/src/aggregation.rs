//! Aggregation phase 2: per-film statistics over each person's prior films.
//!
//! For a reference film `f` and a person `p`, the before-window is every film
//! of `p`'s filmography whose `(release date, id)` sorts strictly before
//! `f`'s. Missing or FAILED films resolve to the sentinel film, whose
//! far-future date keeps them out of every window. Within a window a value
//! equal to its policy default (zero) counts as unavailable and is skipped;
//! averages divide by at least one.

use std::fmt;

use chrono::Datelike;
use rayon::prelude::*;

use marquee_model::{FILMS_AGG, Film, FilmAggregates, Person, PersonKey, sentinel_date};

use crate::config::AggregationConfig;
use crate::error::{MarqueeError, Result};
use crate::registry::{Registry, Snapshot};
use crate::store::{DocumentStore, insert_record};

/// Average and maximum of the usable values in a window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub avg: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum: f64,
    count: usize,
    max: f64,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        if value.is_nan() || value <= 0.0 {
            return;
        }
        self.sum += value;
        self.count += 1;
        self.max = self.max.max(value);
    }

    /// Like [`push`](Self::push) but keeps zero, for counts where zero is a
    /// real observation.
    fn push_count(&mut self, value: f64) {
        if value.is_nan() || value < 0.0 {
            return;
        }
        self.sum += value;
        self.count += 1;
        self.max = self.max.max(value);
    }

    fn summary(&self) -> Summary {
        Summary {
            avg: self.sum / self.count.max(1) as f64,
            max: self.max,
        }
    }
}

/// One person's statistics over their before-window of a film.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowStats {
    pub appearances: usize,
    pub revenue: Summary,
    pub critic_score: Summary,
    pub audience_score: Summary,
    pub votes: Summary,
}

/// Films of `person` released strictly before `film`, oldest first.
pub fn before_window<'a>(snapshot: &'a Snapshot, person: &Person, film: &Film) -> Vec<&'a Film> {
    let reference = film.sort_key();
    let sentinel = sentinel_date();
    let mut window: Vec<&Film> = person
        .films
        .iter()
        .map(|id| snapshot.film_or_sentinel(id))
        .filter(|prior| prior.release_date != sentinel && prior.sort_key() < reference)
        .collect();
    window.sort_by_key(|prior| prior.sort_key());
    window
}

pub fn window_stats(snapshot: &Snapshot, person: &Person, film: &Film) -> WindowStats {
    let window = before_window(snapshot, person, film);
    let mut revenue = Accumulator::default();
    let mut critic_score = Accumulator::default();
    let mut audience_score = Accumulator::default();
    let mut votes = Accumulator::default();

    for prior in &window {
        revenue.push(prior.revenue as f64);
        critic_score.push(prior.critic_score as f64);
        audience_score.push(prior.audience_score);
        votes.push(prior.vote_count as f64);
    }

    WindowStats {
        appearances: window.len(),
        revenue: revenue.summary(),
        critic_score: critic_score.summary(),
        audience_score: audience_score.summary(),
        votes: votes.summary(),
    }
}

/// Approximate age of `person` when `film` was released. `None` when either
/// date is unresolved.
pub fn age_at(person: &Person, film: &Film) -> Option<f64> {
    let sentinel = sentinel_date();
    if person.birth_date == sentinel || film.release_date == sentinel {
        return None;
    }
    Some(f64::from(film.release_date.year() - person.birth_date.year()))
}

/// Computes the aggregate block of `film`.
///
/// Cast fields aggregate across actors: each actor contributes one value
/// (their prior appearance count, their average prior revenue, and so on),
/// and the cast figure is the average or maximum of those values. Every
/// actor with a stored record counts toward appearances, debut actors with
/// zero included. Director fields are the director's own window statistics.
pub fn aggregate_film(snapshot: &Snapshot, film: &Film) -> FilmAggregates {
    let mut appearances = Accumulator::default();
    let mut revenue = Accumulator::default();
    let mut critic_score = Accumulator::default();
    let mut audience_score = Accumulator::default();
    let mut votes = Accumulator::default();
    let mut age = Accumulator::default();

    for actor in &film.actors {
        let key = PersonKey::cast(actor.clone());
        let person = snapshot.person_or_sentinel(&key);
        let stats = window_stats(snapshot, person, film);
        if snapshot.person(&key).is_some() {
            appearances.push_count(stats.appearances as f64);
        }
        revenue.push(stats.revenue.avg);
        critic_score.push(stats.critic_score.avg);
        audience_score.push(stats.audience_score.avg);
        votes.push(stats.votes.avg);
        age.push(age_at(person, film).unwrap_or_default());
    }

    let director_key = PersonKey::director(film.director.clone().unwrap_or_default());
    let director = snapshot.person_or_sentinel(&director_key);
    let directing = window_stats(snapshot, director, film);

    let (appearances, revenue, critic_score, audience_score, votes) = (
        appearances.summary(),
        revenue.summary(),
        critic_score.summary(),
        audience_score.summary(),
        votes.summary(),
    );

    FilmAggregates {
        avg_cast_appearances: appearances.avg,
        max_cast_appearances: appearances.max,
        avg_cast_revenue: revenue.avg,
        max_cast_revenue: revenue.max,
        avg_cast_critic_score: critic_score.avg,
        max_cast_critic_score: critic_score.max,
        avg_cast_audience_score: audience_score.avg,
        max_cast_audience_score: audience_score.max,
        avg_cast_votes: votes.avg,
        max_cast_votes: votes.max,
        avg_cast_age: age.summary().avg,

        director_film_count: directing.appearances as f64,
        avg_director_revenue: directing.revenue.avg,
        max_director_revenue: directing.revenue.max,
        avg_director_critic_score: directing.critic_score.avg,
        max_director_critic_score: directing.critic_score.max,
        avg_director_audience_score: directing.audience_score.avg,
        max_director_audience_score: directing.audience_score.max,
        avg_director_votes: directing.votes.avg,
        max_director_votes: directing.votes.max,
        director_age: age_at(director, film).filter(|age| *age > 0.0).unwrap_or_default(),
    }
}

/// Summary of one aggregation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationReport {
    pub films: usize,
    pub persons: usize,
    pub failed_films: usize,
}

impl fmt::Display for AggregationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} films aggregated ({} FAILED) over {} persons",
            self.films, self.failed_films, self.persons
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    config: AggregationConfig,
}

impl AggregationEngine {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    /// Runs both phases against the store and writes the aggregate
    /// collection.
    pub async fn run(&self, store: &dyn DocumentStore) -> Result<AggregationReport> {
        let registry = Registry::load(store).await?;
        self.run_with(registry, store).await
    }

    /// Like [`run`](Self::run), starting from an already populated registry.
    /// Records persisted by earlier runs are loaded in first.
    pub async fn run_with(
        &self,
        registry: Registry,
        store: &dyn DocumentStore,
    ) -> Result<AggregationReport> {
        registry.load_missing(store).await?;
        let snapshot = registry.freeze();
        let films = self.compute(&snapshot)?;

        if self.config.replace_existing {
            store.drop_collection(FILMS_AGG).await?;
        }
        for film in &films {
            insert_record(store, FILMS_AGG, film).await?;
        }

        let report = AggregationReport {
            films: films.len(),
            persons: snapshot.person_count(),
            failed_films: films.iter().filter(|film| film.failed).count(),
        };
        tracing::info!(target: "marquee::aggregate", %report, "aggregation complete");
        Ok(report)
    }

    /// Computes every film's aggregate block in parallel. Every film takes
    /// part, FAILED ones included.
    pub fn compute(&self, snapshot: &Snapshot) -> Result<Vec<Film>> {
        let films = snapshot.film_list();
        let work = || {
            films
                .par_iter()
                .map(|film| {
                    let mut output = (*film).clone();
                    output.aggregates = aggregate_film(snapshot, film);
                    output
                })
                .collect::<Vec<_>>()
        };

        if self.config.threads == 0 {
            return Ok(work());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|err| MarqueeError::Internal(format!("aggregation thread pool: {err}")))?;
        Ok(pool.install(work))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use marquee_model::{FILMS, FilmId, PERSONS, PersonId, SourceId};

    use super::*;
    use crate::store::{InMemoryStore, all, load_records};

    fn film(id: &str, year: i32, revenue: i64) -> Film {
        let mut film = Film::candidate(SourceId::new(format!("src-{id}")), id, Some(year));
        film.id = FilmId::new(id);
        film.set_release_date(NaiveDate::from_ymd_opt(year, 6, 1).expect("date"));
        film.revenue = revenue;
        film
    }

    fn person(key: PersonKey, born: i32, films: &[&str]) -> Person {
        let mut person = Person::pending(key);
        person.birth_date = NaiveDate::from_ymd_opt(born, 1, 1).expect("date");
        person.set_films(films.iter().map(|id| FilmId::new(*id)).collect());
        person
    }

    fn snapshot(films: Vec<Film>, persons: Vec<Person>) -> Snapshot {
        let registry = Registry::new();
        for film in films {
            registry.insert_film(film);
        }
        for person in persons {
            registry.insert_person(person);
        }
        registry.freeze()
    }

    #[test]
    fn before_window_average_and_max() {
        let f1 = film("f1", 2000, 100);
        let f2 = film("f2", 2005, 200);
        let f3 = film("f3", 2010, 300);
        let actor = person(PersonKey::cast("a"), 1970, &["f3", "f1", "f2"]);
        let snap = snapshot(vec![f1.clone(), f2, f3.clone()], vec![actor]);
        let actor = snap.person_or_sentinel(&PersonKey::cast("a"));

        let before_f3 = window_stats(&snap, actor, &f3);
        assert_eq!(before_f3.revenue, Summary { avg: 150.0, max: 200.0 });
        assert_eq!(before_f3.appearances, 2);

        let before_f1 = window_stats(&snap, actor, &f1);
        assert_eq!(before_f1.revenue, Summary { avg: 0.0, max: 0.0 });
        assert_eq!(before_f1.appearances, 0);
    }

    #[test]
    fn unavailable_values_are_skipped_not_averaged_as_zero() {
        let f1 = film("f1", 2000, 100);
        let f2 = film("f2", 2001, 0);
        let mut f3 = film("f3", 2002, 900);
        f3.failed = true;
        let f4 = film("f4", 2010, 50);
        let actor = person(PersonKey::cast("a"), 1970, &["f1", "f2", "f3", "f4"]);
        let snap = snapshot(vec![f1, f2, f3, f4.clone()], vec![actor]);

        let stats = window_stats(&snap, snap.person_or_sentinel(&PersonKey::cast("a")), &f4);
        // f2 has no revenue, f3 is FAILED and drops out of the window.
        assert_eq!(stats.revenue, Summary { avg: 100.0, max: 100.0 });
        assert_eq!(stats.appearances, 2);
    }

    #[test]
    fn same_day_releases_break_ties_on_id() {
        let a = film("tt-a", 2000, 10);
        let b = film("tt-b", 2000, 20);
        let actor = person(PersonKey::cast("x"), 1970, &["tt-b", "tt-a"]);
        let snap = snapshot(vec![a.clone(), b.clone()], vec![actor]);
        let actor = snap.person_or_sentinel(&PersonKey::cast("x"));

        assert_eq!(window_stats(&snap, actor, &b).revenue.max, 10.0);
        assert_eq!(window_stats(&snap, actor, &a).appearances, 0);
    }

    #[test]
    fn cast_aggregates_average_across_actors() {
        let prior_a = film("p1", 1995, 100);
        let prior_b = film("p2", 1996, 300);
        let mut target = film("t", 2000, 0);
        target.actors = vec![
            PersonId::new("a"),
            PersonId::new("b"),
            PersonId::new("ghost"),
        ];
        let a = person(PersonKey::cast("a"), 1960, &["p1", "t"]);
        let b = person(PersonKey::cast("b"), 1970, &["p1", "p2", "t"]);
        let snap = snapshot(vec![prior_a, prior_b, target.clone()], vec![a, b]);

        let aggregates = aggregate_film(&snap, &target);
        // a: 1 prior, avg 100. b: 2 prior, avg 200. ghost: sentinel, skipped.
        assert_eq!(aggregates.avg_cast_appearances, 1.5);
        assert_eq!(aggregates.max_cast_appearances, 2.0);
        assert_eq!(aggregates.avg_cast_revenue, 150.0);
        assert_eq!(aggregates.max_cast_revenue, 200.0);
        assert_eq!(aggregates.avg_cast_age, 35.0);
    }

    #[test]
    fn debut_actors_count_toward_cast_appearances() {
        let early = film("e1", 1990, 10);
        let later = film("e2", 1995, 30);
        let mut target = film("t", 2000, 0);
        target.actors = vec![PersonId::new("veteran"), PersonId::new("debut")];
        let veteran = person(PersonKey::cast("veteran"), 1960, &["e1", "e2", "t"]);
        let debut = person(PersonKey::cast("debut"), 1980, &["t"]);
        let snap = snapshot(vec![early, later, target.clone()], vec![veteran, debut]);

        let aggregates = aggregate_film(&snap, &target);
        assert_eq!(aggregates.avg_cast_appearances, 1.0);
        assert_eq!(aggregates.max_cast_appearances, 2.0);
        // The debut actor has no prior revenue, which stays unavailable.
        assert_eq!(aggregates.avg_cast_revenue, 20.0);
    }

    #[test]
    fn director_stats_ignore_the_same_persons_acting_career() {
        // "d" acts in x (1990) and directs y (2000) after directing z (1995).
        let mut x = film("x", 1990, 1_000);
        x.actors = vec![PersonId::new("d")];
        let z = film("z", 1995, 40);
        let mut y = film("y", 2000, 0);
        y.director = Some(PersonId::new("d"));
        let actor = person(PersonKey::cast("d"), 1960, &["x"]);
        let director = person(PersonKey::director("d"), 1960, &["z", "y"]);
        let snap = snapshot(vec![x, y.clone(), z], vec![actor, director]);

        let aggregates = aggregate_film(&snap, &y);
        assert_eq!(aggregates.director_film_count, 1.0);
        assert_eq!(aggregates.avg_director_revenue, 40.0);
        assert_eq!(aggregates.max_director_revenue, 40.0);
        assert_eq!(aggregates.director_age, 40.0);
    }

    #[test]
    fn missing_director_yields_neutral_values() {
        let mut lonely = film("solo", 2000, 10);
        lonely.director = Some(PersonId::new("unknown"));
        let snap = snapshot(vec![lonely.clone()], Vec::new());

        assert_eq!(aggregate_film(&snap, &lonely), FilmAggregates::default());
    }

    #[test]
    fn unresolved_birth_dates_have_no_age() {
        let release = film("f", 2000, 1);
        assert_eq!(age_at(&Person::pending(PersonKey::cast("p")), &release), None);
        assert_eq!(
            age_at(&person(PersonKey::cast("p"), 1950, &[]), &release),
            Some(50.0)
        );
    }

    #[tokio::test]
    async fn run_writes_every_film_including_failed() {
        let store = InMemoryStore::new();
        let mut failed = film("bad", 2001, 0);
        failed.failed = true;
        for record in [film("good", 2000, 10), failed] {
            insert_record(&store, FILMS, &record).await.expect("insert");
        }
        insert_record(&store, PERSONS, &person(PersonKey::cast("p"), 1970, &["good"]))
            .await
            .expect("insert");

        let engine = AggregationEngine::new(AggregationConfig::default());
        let report = engine.run(&store).await.expect("aggregate");
        assert_eq!(
            report,
            AggregationReport {
                films: 2,
                persons: 1,
                failed_films: 1,
            }
        );

        // A second run replaces rather than duplicates the output.
        engine.run(&store).await.expect("aggregate again");
        let output: Vec<Film> = load_records(&store, FILMS_AGG).await.expect("load");
        assert_eq!(output.len(), 2);
        assert_eq!(store.count(FILMS_AGG, &all()).await.expect("count"), 2);
    }

    #[test]
    fn dedicated_thread_pool_matches_default() {
        let f1 = film("f1", 2000, 100);
        let mut f2 = film("f2", 2005, 0);
        f2.actors = vec![PersonId::new("a")];
        let snap = snapshot(
            vec![f1, f2],
            vec![person(PersonKey::cast("a"), 1970, &["f1", "f2"])],
        );

        let mut pooled = AggregationEngine::new(AggregationConfig {
            threads: 2,
            ..AggregationConfig::default()
        })
        .compute(&snap)
        .expect("compute");
        let mut default = AggregationEngine::default().compute(&snap).expect("compute");
        pooled.sort_by(|a, b| a.id.cmp(&b.id));
        default.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(pooled, default);
    }
}
