//! Core data model definitions shared across Marquee crates.
#![allow(missing_docs)]

pub mod aggregates;
pub mod error;
pub mod film;
pub mod ids;
pub mod person;
pub mod policy;
pub mod record;

pub use aggregates::FilmAggregates;
pub use error::{ModelError, Result as ModelResult};
pub use film::{Film, FilmPages, SortKey};
pub use ids::{FilmId, FilmKey, PersonId, PersonKey, Role, SourceId};
pub use person::Person;
pub use policy::{
    FILM_POLICY, FieldRule, FilmPolicy, PERSON_POLICY, PersonPolicy, sentinel_date,
};
pub use record::{FILMS, FILMS_AGG, PERSONS, Record};
