//! Persisted document schema.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::film::Film;
use crate::person::Person;

/// Collection holding crawled films.
pub const FILMS: &str = "films";
/// Collection holding crawled people, both roles.
pub const PERSONS: &str = "persons";
/// Collection holding films with their aggregate block filled in.
pub const FILMS_AGG: &str = "films_agg";

/// A model type stored as one JSON document per record.
pub trait Record: Serialize + DeserializeOwned {
    /// Collection the record is written to by the crawl.
    const COLLECTION: &'static str;

    fn to_record(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_record(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

impl Record for Film {
    const COLLECTION: &'static str = FILMS;
}

impl Record for Person {
    const COLLECTION: &'static str = PERSONS;
}
