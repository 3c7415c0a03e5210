//! Document-oriented persistence.
//!
//! Records are JSON objects grouped into named collections. Filters are JSON
//! objects matched by top-level field equality; `{}` matches everything.

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};

use marquee_model::Record;

use crate::error::{MarqueeError, Result};

pub use memory::InMemoryStore;
#[cfg(feature = "database")]
pub use postgres::PostgresStore;

#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    async fn insert(&self, collection: &str, record: Value) -> Result<()>;

    async fn find(&self, collection: &str, filter: &Value) -> Result<Vec<Value>>;

    /// Unique non-null values of `field` among records matching `filter`.
    async fn distinct(&self, collection: &str, field: &str, filter: &Value) -> Result<Vec<Value>>;

    /// Merges `patch` into every matching record. Returns how many matched.
    async fn update(&self, collection: &str, filter: &Value, patch: &Value) -> Result<u64>;

    async fn count(&self, collection: &str, filter: &Value) -> Result<u64>;

    async fn drop_collection(&self, collection: &str) -> Result<()>;
}

/// Empty filter, matching every record.
pub fn all() -> Value {
    Value::Object(Map::new())
}

pub async fn insert_record<R: Record + Sync>(
    store: &dyn DocumentStore,
    collection: &str,
    record: &R,
) -> Result<()> {
    store.insert(collection, record.to_record()?).await
}

/// Loads every record of `collection`. Records that no longer decode are
/// skipped with a warning.
pub async fn load_records<R: Record>(
    store: &dyn DocumentStore,
    collection: &str,
) -> Result<Vec<R>> {
    let documents = store.find(collection, &all()).await?;
    let mut records = Vec::with_capacity(documents.len());
    for document in documents {
        match R::from_record(document) {
            Ok(record) => records.push(record),
            Err(err) => {
                tracing::warn!(
                    target: "marquee::store",
                    collection,
                    error = %err,
                    "skipping undecodable record"
                );
            }
        }
    }
    Ok(records)
}

pub(crate) fn matches(record: &Value, filter: &Value) -> bool {
    match filter.as_object() {
        Some(filter) => filter
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected)),
        None => false,
    }
}

pub(crate) fn require_object(filter: &Value) -> Result<()> {
    if filter.is_object() {
        Ok(())
    } else {
        Err(MarqueeError::Store(format!("filter must be a JSON object, got {filter}")))
    }
}
