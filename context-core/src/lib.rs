pub mod blob;
pub mod chunks;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logs;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod trace;
pub mod vector;

pub use blob::{BlobStore, BlobStoreError, S3BlobStore};
pub use chunks::{ChunkStore, PgChunkStore};
pub use config::ContextConfig;
pub use error::ContextError;
pub use llm::{create_chat_model, ChatModel, LlmError, LlmProvider};
pub use logs::{create_log_store, LogStorageProvider, LogStore, MemoryLogStore, PgLogStore};
pub use models::{Chunk, QueryRecord, VectorMatch};
pub use orchestrator::{AskResponse, PipelineOutput, QueryService, RagPipeline};
pub use trace::{Trace, TraceEntry, TraceStep};
pub use vector::{
    connect_retriever, Embedder, PlaceholderEmbedder, Retriever, VectorBackend, VectorRetriever,
    VectorStoreError, VectorStoreProvider,
};
