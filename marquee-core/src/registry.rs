//! Entity registries.
//!
//! [`Registry`] is the concurrent, append-only map written by the persist
//! stages while crawling. [`Registry::freeze`] turns it into a read-only
//! [`Snapshot`] for aggregation: plain maps, every filmography sorted, and
//! sentinel records standing in for anything missing.

use std::collections::HashMap;
use std::fmt;

use dashmap::DashMap;
use rayon::prelude::*;

use marquee_model::{
    FILM_POLICY, FILMS, Film, FilmId, FilmKey, PERSON_POLICY, PERSONS, Person, PersonKey, Role,
    SortKey, SourceId, sentinel_date,
};

use crate::error::Result;
use crate::store::{DocumentStore, load_records};

#[derive(Default)]
pub struct Registry {
    films: DashMap<FilmKey, Film>,
    persons: DashMap<PersonKey, Person>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("films", &self.films.len())
            .field("persons", &self.persons.len())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a persisted film. Raw pages are dropped; an existing entry for
    /// the same key is kept.
    pub fn insert_film(&self, mut film: Film) -> bool {
        film.prune();
        let mut inserted = false;
        self.films.entry(film.key()).or_insert_with(|| {
            inserted = true;
            film
        });
        inserted
    }

    pub fn insert_person(&self, mut person: Person) -> bool {
        person.page = None;
        let mut inserted = false;
        self.persons.entry(person.key()).or_insert_with(|| {
            inserted = true;
            person
        });
        inserted
    }

    pub fn film_count(&self) -> usize {
        self.films.len()
    }

    pub fn person_count(&self) -> usize {
        self.persons.len()
    }

    pub fn contains_person(&self, key: &PersonKey) -> bool {
        self.persons.contains_key(key)
    }

    /// Dedup keys of every registered film, as the film queues spell them.
    pub fn film_keys(&self) -> Vec<String> {
        self.films.iter().map(|entry| entry.key().to_string()).collect()
    }

    /// Catalog ids of every registered film.
    pub fn source_ids(&self) -> Vec<SourceId> {
        self.films
            .iter()
            .map(|entry| entry.value().source_id.clone())
            .filter(|id| !id.is_empty())
            .collect()
    }

    pub fn person_keys(&self) -> Vec<String> {
        self.persons.iter().map(|entry| entry.key().to_string()).collect()
    }

    /// People referenced by a registered film but not registered themselves,
    /// e.g. because an earlier run stopped before reaching them.
    pub fn dangling_person_keys(&self) -> Vec<PersonKey> {
        let mut dangling: Vec<PersonKey> = self
            .films
            .iter()
            .flat_map(|entry| entry.value().person_keys())
            .filter(|key| !self.persons.contains_key(key))
            .collect();
        dangling.sort();
        dangling.dedup();
        dangling
    }

    /// Aggregation phase 1: reads every persisted film and person into a new
    /// registry.
    pub async fn load(store: &dyn DocumentStore) -> Result<Self> {
        let registry = Self::new();
        registry.load_missing(store).await?;
        Ok(registry)
    }

    /// Adds persisted records not already present, e.g. those written by
    /// earlier runs. Returns how many films and persons were added.
    pub async fn load_missing(&self, store: &dyn DocumentStore) -> Result<(usize, usize)> {
        let films: Vec<Film> = load_records(store, FILMS).await?;
        let persons: Vec<Person> = load_records(store, PERSONS).await?;

        let added_films = films
            .into_iter()
            .map(|film| self.insert_film(film))
            .filter(|inserted| *inserted)
            .count();
        let added_persons = persons
            .into_iter()
            .map(|person| self.insert_person(person))
            .filter(|inserted| *inserted)
            .count();

        tracing::info!(
            target: "marquee::aggregate",
            films = self.film_count(),
            persons = self.person_count(),
            added_films,
            added_persons,
            "registry loaded"
        );
        Ok((added_films, added_persons))
    }

    /// Ends the write phase.
    pub fn freeze(self) -> Snapshot {
        let films: HashMap<FilmKey, Film> = self.films.into_iter().collect();
        let mut persons: HashMap<PersonKey, Person> = self.persons.into_iter().collect();

        let sentinel_film = FILM_POLICY.sentinel();
        let sort_key = |id: &FilmId| -> SortKey {
            match films.get(&FilmKey::Canonical(id.clone())) {
                Some(film) if !film.failed => film.sort_key(),
                _ => (sentinel_date(), id.clone()),
            }
        };
        persons
            .par_iter_mut()
            .for_each(|(_, person)| person.sort_films(sort_key));

        Snapshot {
            films,
            persons,
            sentinel_film,
            sentinel_cast: PERSON_POLICY.sentinel(Role::Cast),
            sentinel_director: PERSON_POLICY.sentinel(Role::Director),
        }
    }
}

/// Read-only registries used by aggregation.
pub struct Snapshot {
    films: HashMap<FilmKey, Film>,
    persons: HashMap<PersonKey, Person>,
    sentinel_film: Film,
    sentinel_cast: Person,
    sentinel_director: Person,
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("films", &self.films.len())
            .field("persons", &self.persons.len())
            .finish_non_exhaustive()
    }
}

impl Snapshot {
    /// The film with canonical `id`, or the sentinel film when it is unknown
    /// or FAILED.
    pub fn film_or_sentinel(&self, id: &FilmId) -> &Film {
        match self.films.get(&FilmKey::Canonical(id.clone())) {
            Some(film) if !film.failed => film,
            _ => &self.sentinel_film,
        }
    }

    /// The stored person under `key`, if any.
    pub fn person(&self, key: &PersonKey) -> Option<&Person> {
        self.persons.get(key)
    }

    pub fn person_or_sentinel(&self, key: &PersonKey) -> &Person {
        self.persons.get(key).unwrap_or(match key.role {
            Role::Cast => &self.sentinel_cast,
            Role::Director => &self.sentinel_director,
        })
    }

    pub fn films(&self) -> impl Iterator<Item = &Film> {
        self.films.values()
    }

    pub fn film_count(&self) -> usize {
        self.films.len()
    }

    pub fn person_count(&self) -> usize {
        self.persons.len()
    }

    pub(crate) fn film_list(&self) -> Vec<&Film> {
        self.films.values().collect()
    }
}
