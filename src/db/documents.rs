use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::store::{new_document_id, CollectionPath, Document, DocumentStore, Fields};

/// Document store over a single Postgres table of JSONB documents keyed by
/// (collection path, id).
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn list(&self, collection: &CollectionPath) -> AppResult<Vec<Document>> {
        let rows: Vec<(String, Json<Fields>)> = sqlx::query_as(
            "SELECT id, fields FROM documents WHERE collection = $1 ORDER BY id ASC",
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, Json(fields))| Document { id, fields })
            .collect())
    }

    async fn get(&self, collection: &CollectionPath, id: &str) -> AppResult<Option<Document>> {
        let row: Option<(String, Json<Fields>)> = sqlx::query_as(
            "SELECT id, fields FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, Json(fields))| Document { id, fields }))
    }

    async fn create(&self, collection: &CollectionPath, fields: Fields) -> AppResult<String> {
        let id = new_document_id();
        sqlx::query("INSERT INTO documents (collection, id, fields) VALUES ($1, $2, $3)")
            .bind(collection.as_str())
            .bind(&id)
            .bind(Json(fields))
            .execute(&self.pool)
            .await?;

        tracing::info!("Document created: collection={}, id={}", collection, id);
        Ok(id)
    }

    async fn update(&self, collection: &CollectionPath, id: &str, fields: Fields) -> AppResult<()> {
        let rows_affected = sqlx::query(
            "UPDATE documents SET fields = fields || $3, updated_at = NOW() \
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(fields))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("{}/{} not found", collection, id)));
        }

        tracing::info!("Document updated: collection={}, id={}", collection, id);
        Ok(())
    }

    async fn delete(&self, collection: &CollectionPath, id: &str) -> AppResult<()> {
        let rows_affected = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(
            "Document deleted: collection={}, id={}, rows_affected={}",
            collection,
            id,
            rows_affected
        );
        Ok(())
    }
}
