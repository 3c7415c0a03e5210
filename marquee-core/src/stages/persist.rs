use std::sync::Arc;

use async_trait::async_trait;

use marquee_model::{FILMS, Film, PERSONS, Person};

use crate::error::Result;
use crate::pipeline::{Completion, EntityKind, Stage};
use crate::queue::WorkItem;
use crate::registry::Registry;
use crate::store::{DocumentStore, insert_record};

/// Writes a finished film and retains its pruned projection in the registry.
///
/// A store error drops the film for this run; it is picked up again on the
/// next resumed crawl because nothing was recorded for it.
#[derive(Debug, Clone)]
pub struct PersistFilmStage {
    store: Arc<dyn DocumentStore>,
    registry: Arc<Registry>,
}

impl PersistFilmStage {
    pub fn new(store: Arc<dyn DocumentStore>, registry: Arc<Registry>) -> Self {
        Self { store, registry }
    }
}

#[async_trait]
impl Stage for PersistFilmStage {
    type Input = Film;
    type Output = Completion;

    fn name(&self) -> &'static str {
        "persist_film"
    }

    async fn process(&self, mut film: Film) -> Result<Vec<Completion>> {
        film.prune();
        insert_record(self.store.as_ref(), FILMS, &film).await?;

        let completion = Completion {
            kind: EntityKind::Film,
            key: film.dedup_key(),
            failed: film.failed,
        };
        self.registry.insert_film(film);
        Ok(vec![completion])
    }
}

#[derive(Debug, Clone)]
pub struct PersistPersonStage {
    store: Arc<dyn DocumentStore>,
    registry: Arc<Registry>,
}

impl PersistPersonStage {
    pub fn new(store: Arc<dyn DocumentStore>, registry: Arc<Registry>) -> Self {
        Self { store, registry }
    }
}

#[async_trait]
impl Stage for PersistPersonStage {
    type Input = Person;
    type Output = Completion;

    fn name(&self) -> &'static str {
        "persist_person"
    }

    async fn process(&self, mut person: Person) -> Result<Vec<Completion>> {
        person.page = None;
        insert_record(self.store.as_ref(), PERSONS, &person).await?;

        let completion = Completion {
            kind: EntityKind::Person,
            key: person.dedup_key(),
            failed: person.failed,
        };
        self.registry.insert_person(person);
        Ok(vec![completion])
    }
}
