use thiserror::Error;

use crate::blob::BlobStoreError;
use crate::llm::LlmError;
use crate::vector::VectorStoreError;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unsupported {kind} provider: {name}")]
    UnsupportedProvider { kind: &'static str, name: String },

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("Object storage error: {0}")]
    BlobStore(#[from] BlobStoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T, E = ContextError> = std::result::Result<T, E>;
