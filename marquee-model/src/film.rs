use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::aggregates::FilmAggregates;
use crate::ids::{FilmId, FilmKey, PersonId, PersonKey, SourceId};
use crate::policy::FILM_POLICY;

/// Chronological ordering key. The id breaks ties between films released on
/// the same day so filmographies sort reproducibly.
pub type SortKey = (NaiveDate, FilmId);

/// Raw documents fetched for a film. Dropped before the record is retained
/// in the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilmPages {
    pub title_page: Option<String>,
    pub credits_page: Option<String>,
    pub source_page: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Film {
    pub id: FilmId,
    #[serde(rename = "FAILED")]
    pub failed: bool,
    pub source_id: SourceId,
    pub source_title: String,
    pub source_year: Option<i32>,
    pub critic_score: i64,
    pub audience_score: f64,
    pub vote_count: i64,
    pub runtime_minutes: i64,
    pub content_rating: String,
    pub budget: i64,
    pub release_date: NaiveDate,
    pub release_month: u32,
    pub release_day: u32,
    pub release_weekday: u32,
    pub revenue: i64,
    pub director: Option<PersonId>,
    pub actors: Vec<PersonId>,
    #[serde(flatten)]
    pub aggregates: FilmAggregates,
    #[serde(skip)]
    pub pages: Option<FilmPages>,
}

impl Default for Film {
    fn default() -> Self {
        FILM_POLICY.sentinel()
    }
}

impl Film {
    /// A freshly discovered catalog entry, not yet matched on the index site.
    pub fn candidate(source_id: SourceId, title: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            source_id,
            source_title: title.into(),
            source_year: year,
            ..Self::default()
        }
    }

    pub fn key(&self) -> FilmKey {
        if self.id.is_empty() {
            FilmKey::Unresolved(self.source_id.clone())
        } else {
            FilmKey::Canonical(self.id.clone())
        }
    }

    pub fn sort_key(&self) -> SortKey {
        (self.release_date, self.id.clone())
    }

    pub fn is_resolved(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn release_year(&self) -> i32 {
        self.release_date.year()
    }

    /// Sets the release date together with the calendar fields derived from
    /// it. Weekday is ISO numbered, Monday = 1.
    pub fn set_release_date(&mut self, date: NaiveDate) {
        self.release_date = date;
        self.release_month = date.month();
        self.release_day = date.day();
        self.release_weekday = date.weekday().number_from_monday();
    }

    /// Every person key this film references: each actor in the cast role,
    /// then the director under the namespaced role.
    pub fn person_keys(&self) -> Vec<PersonKey> {
        let mut keys: Vec<PersonKey> = self
            .actors
            .iter()
            .filter(|id| !id.is_empty())
            .cloned()
            .map(PersonKey::cast)
            .collect();
        if let Some(director) = self.director.as_ref().filter(|id| !id.is_empty()) {
            keys.push(PersonKey::director(director.clone()));
        }
        keys
    }

    /// Drops the fetched documents, leaving only the persisted projection.
    pub fn prune(&mut self) {
        self.pages = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::sentinel_date;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn candidate_starts_from_policy_defaults() {
        let film = Film::candidate(SourceId::new("avatar"), "Avatar", Some(2009));

        assert_eq!(film.release_date, sentinel_date());
        assert_eq!(film.content_rating, "None");
        assert_eq!(film.key(), FilmKey::Unresolved(SourceId::new("avatar")));
        assert!(!film.failed);
    }

    #[test]
    fn release_date_derives_calendar_fields() {
        let mut film = Film::default();
        // 2009-12-18 was a Friday.
        film.set_release_date(date(2009, 12, 18));

        assert_eq!(film.release_month, 12);
        assert_eq!(film.release_day, 18);
        assert_eq!(film.release_weekday, 5);
    }

    #[test]
    fn record_round_trips_through_persisted_schema() {
        let mut film = Film::candidate(SourceId::new("titanic"), "Titanic", Some(1997));
        film.id = FilmId::new("tt0120338");
        film.failed = true;
        film.critic_score = 75;
        film.audience_score = 7.8;
        film.vote_count = 1_000_000;
        film.revenue = 2_187_463_944;
        film.set_release_date(date(1997, 12, 19));
        film.director = Some(PersonId::new("nm0000116"));
        film.actors = vec![PersonId::new("nm0000138"), PersonId::new("nm0000701")];
        film.aggregates.avg_cast_revenue = 150.0;
        film.aggregates.director_age = 43.0;

        let record = serde_json::to_value(&film).expect("serialize");
        assert_eq!(record["FAILED"], serde_json::Value::Bool(true));
        assert_eq!(record["sourceId"], "titanic");
        assert_eq!(record["avgCastRevenue"], 150.0);

        let restored: Film = serde_json::from_value(record).expect("deserialize");
        assert_eq!(restored, film);
    }

    #[test]
    fn raw_pages_are_never_persisted() {
        let mut film = Film::default();
        film.pages = Some(FilmPages {
            title_page: Some("<html/>".into()),
            ..FilmPages::default()
        });

        let record = serde_json::to_string(&film).expect("serialize");
        assert!(!record.contains("<html/>"));

        film.prune();
        assert!(film.pages.is_none());
    }

    #[test]
    fn person_keys_namespace_the_director() {
        let mut film = Film::default();
        film.actors = vec![PersonId::new("nm1"), PersonId::new("nm2")];
        film.director = Some(PersonId::new("nm1"));

        let keys: Vec<String> = film.person_keys().iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["nm1", "nm2", "director-nm1"]);
    }
}
