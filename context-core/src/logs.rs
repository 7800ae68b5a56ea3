//! Query log storage: persists each answered question with its trace so it
//! can be replayed by id. Rows are insert-only.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::LogStorageConfig;
use crate::error::{ContextError, Result};
use crate::models::QueryRecord;
use crate::trace::TraceEntry;

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Persist one record. Saving an id twice is an error.
    async fn save(&self, record: &QueryRecord) -> Result<()>;

    /// Fetch a record by id, `None` when it was never saved.
    async fn get(&self, query_id: Uuid) -> Result<Option<QueryRecord>>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStorageProvider {
    Postgres,
    Memory,
}

impl FromStr for LogStorageProvider {
    type Err = ContextError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(LogStorageProvider::Postgres),
            "memory" => Ok(LogStorageProvider::Memory),
            other => Err(ContextError::UnsupportedProvider {
                kind: "log storage",
                name: other.to_string(),
            }),
        }
    }
}

pub fn create_log_store(config: &LogStorageConfig, pool: &PgPool) -> Result<Arc<dyn LogStore>> {
    let store: Arc<dyn LogStore> = match config.provider.parse::<LogStorageProvider>()? {
        LogStorageProvider::Postgres => Arc::new(PgLogStore::new(pool.clone())),
        LogStorageProvider::Memory => Arc::new(MemoryLogStore::new()),
    };
    tracing::info!(backend = store.name(), "Log store configured");
    Ok(store)
}

// ============================================================================
// Postgres
// ============================================================================

#[derive(Debug, Clone)]
pub struct PgLogStore {
    pool: PgPool,
}

impl PgLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct QueryHistoryRow {
    query_id: Uuid,
    query: String,
    answer: String,
    logs: Json<Vec<TraceEntry>>,
    created_at: DateTime<Utc>,
}

impl From<QueryHistoryRow> for QueryRecord {
    fn from(row: QueryHistoryRow) -> Self {
        QueryRecord {
            query_id: row.query_id,
            query: row.query,
            answer: row.answer,
            logs: row.logs.0,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl LogStore for PgLogStore {
    async fn save(&self, record: &QueryRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO query_history (query_id, query, answer, logs, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.query_id)
        .bind(&record.query)
        .bind(&record.answer)
        .bind(Json(&record.logs))
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(query_id = %record.query_id, entries = record.logs.len(), "Query log saved");
        Ok(())
    }

    async fn get(&self, query_id: Uuid) -> Result<Option<QueryRecord>> {
        let row: Option<QueryHistoryRow> = sqlx::query_as(
            r#"
            SELECT query_id, query, answer, logs, created_at
            FROM query_history
            WHERE query_id = $1
            "#,
        )
        .bind(query_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(QueryRecord::from))
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

// ============================================================================
// In-process
// ============================================================================

/// Keeps records in memory for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    records: RwLock<HashMap<Uuid, QueryRecord>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn save(&self, record: &QueryRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.query_id) {
            return Err(ContextError::Other(format!(
                "Query {} is already logged",
                record.query_id
            )));
        }
        records.insert(record.query_id, record.clone());
        Ok(())
    }

    async fn get(&self, query_id: Uuid) -> Result<Option<QueryRecord>> {
        Ok(self.records.read().await.get(&query_id).cloned())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
