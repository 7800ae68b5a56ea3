//! Postgres + pgvector backend.
//!
//! The collection is a table named after it:
//! `(id UUID, embedding vector(N), metadata JSONB)` with an HNSW cosine index.
//! Score = 1 - cosine_distance, same as the Qdrant `Cosine` metric.

use pgvector::Vector;
use sqlx::PgPool;

use super::VectorStoreError;
use crate::models::VectorMatch;

pub struct PgVectorStore {
    pool: PgPool,
    table: String,
    dimensions: usize,
}

/// Collection names are interpolated into DDL, so only plain identifiers pass.
pub fn validate_collection_name(name: &str) -> Result<(), VectorStoreError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && name.len() <= 63 {
        Ok(())
    } else {
        Err(VectorStoreError::InvalidCollectionName(name.to_string()))
    }
}

impl PgVectorStore {
    pub fn new(pool: PgPool, collection: &str, dimensions: usize) -> Result<Self, VectorStoreError> {
        validate_collection_name(collection)?;
        Ok(Self {
            pool,
            table: collection.to_string(),
            dimensions,
        })
    }

    pub async fn collection_exists(&self) -> Result<bool, VectorStoreError> {
        let row: (bool,) = sqlx::query_as("SELECT to_regclass($1) IS NOT NULL")
            .bind(&self.table)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Returns `true` when the table had to be created.
    pub async fn ensure_collection(&self) -> Result<bool, VectorStoreError> {
        if self.collection_exists().await? {
            return Ok(false);
        }

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id        UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                embedding vector({dims}) NOT NULL,
                metadata  JSONB NOT NULL DEFAULT '{{}}'::jsonb
            )
            "#,
            table = self.table,
            dims = self.dimensions,
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_embedding_idx ON {table} \
             USING hnsw (embedding vector_cosine_ops)",
            table = self.table,
        ))
        .execute(&self.pool)
        .await?;

        Ok(true)
    }

    pub async fn search(
        &self,
        vector: &[f32],
        limit: u32,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        let query_vector = Vector::from(vector.to_vec());

        let rows = sqlx::query_as::<_, (String, serde_json::Value, Option<f64>)>(&format!(
            r#"
            SELECT
                id::text,
                metadata,
                1 - (embedding <=> $1::vector) AS score
            FROM {table}
            ORDER BY embedding <=> $1::vector
            LIMIT $2
            "#,
            table = self.table,
        ))
        .bind(&query_vector)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, metadata, score)| VectorMatch {
                point_id: id,
                score: score.unwrap_or(0.0) as f32,
                metadata,
            })
            .collect())
    }
}
