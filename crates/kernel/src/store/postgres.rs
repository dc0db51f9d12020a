//! PostgreSQL document store.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use super::query_builder::DocumentQueryBuilder;
use super::{Collection, DocumentStore, FindOptions, StoreError, document_id};
use crate::query::Filter;

/// Documents kept as JSONB rows of the `documents` table.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn write_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate,
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let sql = DocumentQueryBuilder::new(collection, filter)?.build_count();
        let total: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError> {
        let sql = DocumentQueryBuilder::new(collection, filter)?.build_find(options);
        tracing::debug!(collection = %collection, %sql, "find");
        let rows: Vec<Value> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn insert(&self, collection: Collection, doc: Value) -> Result<(), StoreError> {
        let id = document_id(&doc)?;
        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection.as_str())
            .bind(id)
            .bind(&doc)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn replace(&self, collection: Collection, doc: Value) -> Result<bool, StoreError> {
        let id = document_id(&doc)?;
        let result = sqlx::query("UPDATE documents SET body = $3 WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .bind(&doc)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_fields(
        &self,
        collection: Collection,
        id: Uuid,
        fields: Map<String, Value>,
    ) -> Result<bool, StoreError> {
        let (removed, set): (Vec<_>, Vec<_>) = fields.into_iter().partition(|(_, v)| v.is_null());
        let removed: Vec<String> = removed.into_iter().map(|(k, _)| k).collect();
        let set = Value::Object(set.into_iter().collect());
        let result = sqlx::query(
            "UPDATE documents SET body = (body || $3) - $4::text[] WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(&set)
        .bind(&removed)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        let sql = DocumentQueryBuilder::new(collection, filter)?.build_delete();
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> bool {
        crate::db::check_health(&self.pool).await
    }
}
