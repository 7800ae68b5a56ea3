//! Vector store access: similarity search over chunk embeddings
//!
//! Provides a `Retriever` trait and the `VectorRetriever` implementation that
//! binds together:
//! - an `Embedder` (currently the constant-vector `PlaceholderEmbedder`)
//! - a backend: **Qdrant** over its REST API, or **pgvector** in Postgres
//! - the number of matches to return (`top_k`)
//!
//! The collection is created on connect (cosine distance, fixed dimensions)
//! when it does not exist yet.

pub mod pg_store;
pub mod qdrant;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::config::VectorStoreConfig;
use crate::error::ContextError;
use crate::models::VectorMatch;

pub use self::pg_store::PgVectorStore;
pub use self::qdrant::QdrantClient;

/// Dimensionality of the placeholder embedding and of new collections.
pub const DEFAULT_DIMENSIONS: usize = 384;

const PLACEHOLDER_VALUE: f32 = 0.1;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid collection name: {0}")]
    InvalidCollectionName(String),

    #[error("Embedding has {actual} dimensions, collection expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Which vector database backs the retriever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorStoreProvider {
    Qdrant,
    PgVector,
}

impl FromStr for VectorStoreProvider {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "pgvector" | "postgres" => Ok(Self::PgVector),
            other => Err(ContextError::UnsupportedProvider {
                kind: "vector store",
                name: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Embedder
// ============================================================================

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, VectorStoreError>;

    fn dimensions(&self) -> usize;

    fn name(&self) -> &str;
}

/// Returns the same vector for every input. Retrieval ranking is therefore
/// arbitrary; swap in a real model before relying on match quality.
#[derive(Debug, Clone)]
pub struct PlaceholderEmbedder {
    dimensions: usize,
}

impl PlaceholderEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for PlaceholderEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for PlaceholderEmbedder {
    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, VectorStoreError> {
        Ok(vec![PLACEHOLDER_VALUE; self.dimensions])
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}

// ============================================================================
// Retriever
// ============================================================================

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return the matches most similar to `query`, best first.
    async fn similarity_search(&self, query: &str) -> Result<Vec<VectorMatch>, VectorStoreError>;
}

pub enum VectorBackend {
    Qdrant(QdrantClient),
    PgVector(PgVectorStore),
}

impl VectorBackend {
    pub fn name(&self) -> &str {
        match self {
            VectorBackend::Qdrant(_) => "qdrant",
            VectorBackend::PgVector(_) => "pgvector",
        }
    }

    /// Returns `true` when the collection had to be created.
    pub async fn ensure_collection(&self, dimensions: usize) -> Result<bool, VectorStoreError> {
        match self {
            VectorBackend::Qdrant(c) => c.ensure_collection(dimensions).await,
            VectorBackend::PgVector(s) => s.ensure_collection().await,
        }
    }

    pub async fn collection_exists(&self) -> Result<bool, VectorStoreError> {
        match self {
            VectorBackend::Qdrant(c) => c.collection_exists().await,
            VectorBackend::PgVector(s) => s.collection_exists().await,
        }
    }

    pub async fn search(
        &self,
        vector: &[f32],
        limit: u32,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        match self {
            VectorBackend::Qdrant(c) => c.search(vector, limit).await,
            VectorBackend::PgVector(s) => s.search(vector, limit).await,
        }
    }
}

pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    backend: VectorBackend,
    top_k: u32,
}

impl VectorRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, backend: VectorBackend, top_k: u32) -> Self {
        Self {
            embedder,
            backend,
            top_k: top_k.max(1),
        }
    }

    pub fn backend(&self) -> &VectorBackend {
        &self.backend
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn similarity_search(&self, query: &str) -> Result<Vec<VectorMatch>, VectorStoreError> {
        let vector = self.embedder.embed_query(query).await?;

        if vector.len() != self.embedder.dimensions() {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.embedder.dimensions(),
                actual: vector.len(),
            });
        }

        let matches = self.backend.search(&vector, self.top_k).await?;

        tracing::debug!(
            backend = self.backend.name(),
            embedder = self.embedder.name(),
            top_k = self.top_k,
            count = matches.len(),
            "Similarity search complete"
        );

        Ok(matches)
    }
}

/// Build the configured backend without touching the network.
pub fn create_backend(
    config: &VectorStoreConfig,
    pool: &PgPool,
) -> Result<VectorBackend, ContextError> {
    let backend = match config.provider.parse::<VectorStoreProvider>()? {
        VectorStoreProvider::Qdrant => VectorBackend::Qdrant(QdrantClient::new(
            &config.url,
            config.api_key.clone(),
            &config.collection,
        )?),
        VectorStoreProvider::PgVector => VectorBackend::PgVector(PgVectorStore::new(
            pool.clone(),
            &config.collection,
            config.dimensions,
        )?),
    };
    Ok(backend)
}

/// Create the backend, make sure its collection exists, and wrap it as a retriever.
pub async fn connect_retriever(
    config: &VectorStoreConfig,
    pool: &PgPool,
) -> Result<VectorRetriever, ContextError> {
    let backend = create_backend(config, pool)?;

    if backend.ensure_collection(config.dimensions).await? {
        tracing::info!(
            backend = backend.name(),
            collection = %config.collection,
            dimensions = config.dimensions,
            "Created vector collection"
        );
    }

    let embedder: Arc<dyn Embedder> = Arc::new(PlaceholderEmbedder::new(config.dimensions));
    Ok(VectorRetriever::new(embedder, backend, config.top_k))
}
