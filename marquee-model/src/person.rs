use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::film::SortKey;
use crate::ids::{FilmId, PersonId, PersonKey, Role};
use crate::policy::PERSON_POLICY;

/// One career of one individual. An actor who also directs is two records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Person {
    pub id: PersonId,
    #[serde(rename = "FAILED")]
    pub failed: bool,
    pub role: Role,
    pub name: String,
    pub birth_date: NaiveDate,
    /// Oldest first once fetched; chronological by release date once
    /// [`Person::sort_films`] has run.
    pub films: Vec<FilmId>,
    /// Stored with the record so a sorted filmography is not re-sorted
    /// after a reload.
    pub films_sorted: bool,
    #[serde(skip)]
    pub page: Option<String>,
}

impl Default for Person {
    fn default() -> Self {
        PERSON_POLICY.sentinel(Role::Cast)
    }
}

impl Person {
    /// A person waiting in the detail pipeline.
    pub fn pending(key: PersonKey) -> Self {
        Self {
            id: key.id,
            role: key.role,
            films_sorted: false,
            ..Self::default()
        }
    }

    pub fn key(&self) -> PersonKey {
        PersonKey::new(self.id.clone(), self.role)
    }

    pub fn birth_year(&self) -> i32 {
        self.birth_date.year()
    }

    /// Replaces the filmography. The new list is not assumed to be in
    /// release order.
    pub fn set_films(&mut self, films: Vec<FilmId>) {
        self.films = films;
        self.films_sorted = false;
    }

    /// Orders the filmography by `(release date, id)`. A no-op once sorted.
    pub fn sort_films<F>(&mut self, key_of: F)
    where
        F: Fn(&FilmId) -> SortKey,
    {
        if self.films_sorted {
            return;
        }
        self.films.sort_by_cached_key(|id| key_of(id));
        self.films_sorted = true;
    }
}
