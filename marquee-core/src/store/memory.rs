use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{DocumentStore, matches, require_object};
use crate::error::{MarqueeError, Result};

/// Process-local store for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert(&self, collection: &str, record: Value) -> Result<()> {
        if !record.is_object() {
            return Err(MarqueeError::Store(format!(
                "record for {collection} must be a JSON object"
            )));
        }
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn find(&self, collection: &str, filter: &Value) -> Result<Vec<Value>> {
        require_object(filter)?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| matches(record, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn distinct(&self, collection: &str, field: &str, filter: &Value) -> Result<Vec<Value>> {
        let mut values: Vec<Value> = Vec::new();
        for record in self.find(collection, filter).await? {
            match record.get(field) {
                Some(Value::Null) | None => {}
                Some(value) if values.contains(value) => {}
                Some(value) => values.push(value.clone()),
            }
        }
        Ok(values)
    }

    async fn update(&self, collection: &str, filter: &Value, patch: &Value) -> Result<u64> {
        require_object(filter)?;
        let Some(patch) = patch.as_object() else {
            return Err(MarqueeError::Store("patch must be a JSON object".into()));
        };
        let mut collections = self.collections.write().await;
        let mut updated = 0;
        for record in collections.get_mut(collection).into_iter().flatten() {
            if !matches(record, filter) {
                continue;
            }
            if let Some(fields) = record.as_object_mut() {
                for (field, value) in patch {
                    fields.insert(field.clone(), value.clone());
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn count(&self, collection: &str, filter: &Value) -> Result<u64> {
        Ok(self.find(collection, filter).await?.len() as u64)
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.collections.write().await.remove(collection);
        Ok(())
    }
}
