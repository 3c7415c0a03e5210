//! Per-entity field resolution tables.
//!
//! Every extracted field has exactly one rule: the value it degrades to when
//! resolution fails, and whether that failure marks the owning entity
//! FAILED. Sentinel records (used in place of missing or failed references)
//! are assembled from the same defaults.

use std::fmt;

use chrono::NaiveDate;

use crate::aggregates::FilmAggregates;
use crate::film::Film;
use crate::ids::{FilmId, PersonId, Role, SourceId};
use crate::person::Person;

/// Far-future date that sorts unresolved releases and birthdays last.
pub fn sentinel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(3000, 1, 1).unwrap_or(NaiveDate::MAX)
}

/// Default value and importance of one field.
pub struct FieldRule<T> {
    pub name: &'static str,
    pub important: bool,
    default: fn() -> T,
}

impl<T> FieldRule<T> {
    pub const fn new(name: &'static str, important: bool, default: fn() -> T) -> Self {
        Self {
            name,
            important,
            default,
        }
    }

    pub fn default_value(&self) -> T {
        (self.default)()
    }
}

impl<T> fmt::Debug for FieldRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRule")
            .field("name", &self.name)
            .field("important", &self.important)
            .finish_non_exhaustive()
    }
}

/// Rules for every field a film extractor can fail to resolve.
#[derive(Debug)]
pub struct FilmPolicy {
    pub id: FieldRule<FilmId>,
    pub source_id: FieldRule<SourceId>,
    pub source_title: FieldRule<String>,
    pub source_year: FieldRule<Option<i32>>,
    pub title_page: FieldRule<Option<String>>,
    pub source_page: FieldRule<Option<String>>,
    pub credits_page: FieldRule<Option<String>>,
    pub critic_score: FieldRule<i64>,
    pub audience_score: FieldRule<f64>,
    pub vote_count: FieldRule<i64>,
    pub runtime_minutes: FieldRule<i64>,
    pub content_rating: FieldRule<String>,
    pub budget: FieldRule<i64>,
    pub release_date: FieldRule<NaiveDate>,
    pub release_month: FieldRule<u32>,
    pub release_day: FieldRule<u32>,
    pub release_weekday: FieldRule<u32>,
    pub revenue: FieldRule<i64>,
    pub director: FieldRule<Option<PersonId>>,
    pub actors: FieldRule<Vec<PersonId>>,
}

impl FilmPolicy {
    /// Names of every important film field.
    pub fn important_fields(&self) -> Vec<&'static str> {
        self.all()
            .into_iter()
            .filter(|(_, important)| *important)
            .map(|(name, _)| name)
            .collect()
    }

    /// Looks a rule's importance up by field name.
    pub fn is_important(&self, field: &str) -> Option<bool> {
        self.all()
            .into_iter()
            .find(|(name, _)| *name == field)
            .map(|(_, important)| important)
    }

    fn all(&self) -> [(&'static str, bool); 20] {
        [
            (self.id.name, self.id.important),
            (self.source_id.name, self.source_id.important),
            (self.source_title.name, self.source_title.important),
            (self.source_year.name, self.source_year.important),
            (self.title_page.name, self.title_page.important),
            (self.source_page.name, self.source_page.important),
            (self.credits_page.name, self.credits_page.important),
            (self.critic_score.name, self.critic_score.important),
            (self.audience_score.name, self.audience_score.important),
            (self.vote_count.name, self.vote_count.important),
            (self.runtime_minutes.name, self.runtime_minutes.important),
            (self.content_rating.name, self.content_rating.important),
            (self.budget.name, self.budget.important),
            (self.release_date.name, self.release_date.important),
            (self.release_month.name, self.release_month.important),
            (self.release_day.name, self.release_day.important),
            (self.release_weekday.name, self.release_weekday.important),
            (self.revenue.name, self.revenue.important),
            (self.director.name, self.director.important),
            (self.actors.name, self.actors.important),
        ]
    }

    /// A film carrying nothing but defaults. Stands in for any reference that
    /// is missing from the registry or FAILED.
    pub fn sentinel(&self) -> Film {
        Film {
            id: self.id.default_value(),
            failed: false,
            source_id: self.source_id.default_value(),
            source_title: self.source_title.default_value(),
            source_year: self.source_year.default_value(),
            critic_score: self.critic_score.default_value(),
            audience_score: self.audience_score.default_value(),
            vote_count: self.vote_count.default_value(),
            runtime_minutes: self.runtime_minutes.default_value(),
            content_rating: self.content_rating.default_value(),
            budget: self.budget.default_value(),
            release_date: self.release_date.default_value(),
            release_month: self.release_month.default_value(),
            release_day: self.release_day.default_value(),
            release_weekday: self.release_weekday.default_value(),
            revenue: self.revenue.default_value(),
            director: self.director.default_value(),
            actors: self.actors.default_value(),
            aggregates: FilmAggregates::default(),
            pages: None,
        }
    }
}

/// Rules for every field a person extractor can fail to resolve.
#[derive(Debug)]
pub struct PersonPolicy {
    pub id: FieldRule<PersonId>,
    pub page: FieldRule<Option<String>>,
    pub name: FieldRule<String>,
    pub birth_date: FieldRule<NaiveDate>,
    pub films: FieldRule<Vec<FilmId>>,
}

impl PersonPolicy {
    pub fn is_important(&self, field: &str) -> Option<bool> {
        [
            (self.id.name, self.id.important),
            (self.page.name, self.page.important),
            (self.name.name, self.name.important),
            (self.birth_date.name, self.birth_date.important),
            (self.films.name, self.films.important),
        ]
        .into_iter()
        .find(|(name, _)| *name == field)
        .map(|(_, important)| important)
    }

    pub fn sentinel(&self, role: Role) -> Person {
        Person {
            id: self.id.default_value(),
            failed: false,
            role,
            name: self.name.default_value(),
            birth_date: self.birth_date.default_value(),
            films: self.films.default_value(),
            films_sorted: false,
            page: None,
        }
    }
}

pub static FILM_POLICY: FilmPolicy = FilmPolicy {
    id: FieldRule::new("id", true, FilmId::default),
    source_id: FieldRule::new("source_id", true, SourceId::default),
    source_title: FieldRule::new("source_title", false, String::new),
    source_year: FieldRule::new("source_year", false, || None),
    title_page: FieldRule::new("title_page", true, || None),
    source_page: FieldRule::new("source_page", true, || None),
    credits_page: FieldRule::new("credits_page", false, || None),
    critic_score: FieldRule::new("critic_score", false, || 0),
    audience_score: FieldRule::new("audience_score", false, || 0.0),
    vote_count: FieldRule::new("vote_count", false, || 0),
    runtime_minutes: FieldRule::new("runtime_minutes", false, || 0),
    content_rating: FieldRule::new("content_rating", false, || "None".to_string()),
    budget: FieldRule::new("budget", false, || 0),
    release_date: FieldRule::new("release_date", true, sentinel_date),
    release_month: FieldRule::new("release_month", false, || 0),
    release_day: FieldRule::new("release_day", false, || 0),
    release_weekday: FieldRule::new("release_weekday", false, || 0),
    revenue: FieldRule::new("revenue", true, || 0),
    director: FieldRule::new("director", false, || None),
    actors: FieldRule::new("actors", true, Vec::new),
};

pub static PERSON_POLICY: PersonPolicy = PersonPolicy {
    id: FieldRule::new("id", true, PersonId::default),
    page: FieldRule::new("page", true, || None),
    name: FieldRule::new("name", false, String::new),
    birth_date: FieldRule::new("birth_date", true, sentinel_date),
    films: FieldRule::new("films", true, Vec::new),
};
