//! Postgres-backed document store. One `documents` table holds every
//! collection; records live in a JSONB column and filters use containment.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use super::{DocumentStore, require_object};
use crate::MIGRATOR;
use crate::error::{MarqueeError, Result};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects, checks the server answers and applies pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| MarqueeError::Store(format!("failed to connect to Postgres: {e}")))?;
        let store = Self::new(pool).await?;
        MIGRATOR.run(&store.pool).await?;
        Ok(store)
    }

    /// Wraps an existing pool after a health check.
    pub async fn new(pool: PgPool) -> Result<Self> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| {
                MarqueeError::Store(format!("document store failed Postgres health check: {e}"))
            })?;
        info!(target: "marquee::store", "document store connected to Postgres");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn insert(&self, collection: &str, record: Value) -> Result<()> {
        sqlx::query("INSERT INTO documents (collection, doc) VALUES ($1, $2)")
            .bind(collection)
            .bind(sqlx::types::Json(record))
            .execute(&self.pool)
            .await
            .map_err(|e| MarqueeError::Store(format!("insert into {collection} failed: {e}")))?;
        Ok(())
    }

    async fn find(&self, collection: &str, filter: &Value) -> Result<Vec<Value>> {
        require_object(filter)?;
        let rows: Vec<sqlx::types::Json<Value>> = sqlx::query_scalar(
            r#"
            SELECT doc
            FROM documents
            WHERE collection = $1
              AND doc @> $2
            ORDER BY id
            "#,
        )
        .bind(collection)
        .bind(sqlx::types::Json(filter))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MarqueeError::Store(format!("find in {collection} failed: {e}")))?;
        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn distinct(&self, collection: &str, field: &str, filter: &Value) -> Result<Vec<Value>> {
        require_object(filter)?;
        let rows: Vec<sqlx::types::Json<Value>> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT doc -> $2::text
            FROM documents
            WHERE collection = $1
              AND doc @> $3
              AND jsonb_typeof(doc -> $2::text) IS DISTINCT FROM 'null'
              AND doc -> $2::text IS NOT NULL
            "#,
        )
        .bind(collection)
        .bind(field)
        .bind(sqlx::types::Json(filter))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MarqueeError::Store(format!("distinct on {collection}.{field} failed: {e}")))?;
        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn update(&self, collection: &str, filter: &Value, patch: &Value) -> Result<u64> {
        require_object(filter)?;
        if !patch.is_object() {
            return Err(MarqueeError::Store("patch must be a JSON object".into()));
        }
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET doc = doc || $3,
                updated_at = NOW()
            WHERE collection = $1
              AND doc @> $2
            "#,
        )
        .bind(collection)
        .bind(sqlx::types::Json(filter))
        .bind(sqlx::types::Json(patch))
        .execute(&self.pool)
        .await
        .map_err(|e| MarqueeError::Store(format!("update of {collection} failed: {e}")))?;
        Ok(result.rows_affected())
    }

    async fn count(&self, collection: &str, filter: &Value) -> Result<u64> {
        require_object(filter)?;
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM documents WHERE collection = $1 AND doc @> $2",
        )
        .bind(collection)
        .bind(sqlx::types::Json(filter))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| MarqueeError::Store(format!("count of {collection} failed: {e}")))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1")
            .bind(collection)
            .execute(&self.pool)
            .await
            .map_err(|e| MarqueeError::Store(format!("drop of {collection} failed: {e}")))?;
        info!(
            target: "marquee::store",
            collection,
            removed = result.rows_affected(),
            "dropped collection"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::all;

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    #[ignore = "requires DATABASE_URL pointing at a Postgres server"]
    async fn documents_round_trip_through_postgres(pool: PgPool) -> anyhow::Result<()> {
        let store = PostgresStore::new(pool).await?;
        store.insert("films", json!({"id": "tt1", "FAILED": false, "revenue": 0})).await?;
        store.insert("films", json!({"id": "tt2", "FAILED": true, "revenue": 0})).await?;

        let fixable = store.find("films", &json!({"FAILED": false, "revenue": 0})).await?;
        assert_eq!(fixable.len(), 1);

        let updated = store
            .update("films", &json!({"id": "tt1"}), &json!({"revenue": 42}))
            .await?;
        assert_eq!(updated, 1);

        let ids = store.distinct("films", "id", &all()).await?;
        assert_eq!(ids.len(), 2);

        store.drop_collection("films").await?;
        assert_eq!(store.count("films", &all()).await?, 0);
        Ok(())
    }
}
