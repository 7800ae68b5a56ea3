//! Startup wiring: turns a loaded [`ContextConfig`] into the shared HTTP state.

use std::sync::Arc;

use context_core::blob::{BlobStore, S3BlobStore};
use context_core::chunks::PgChunkStore;
use context_core::llm::ChatModel;
use context_core::{
    connect_retriever, create_chat_model, create_log_store, db, ContextConfig, ContextError,
    QueryService, RagPipeline,
};
use sqlx::PgPool;

use crate::http::HttpState;

/// Build every backend named by `config`.
///
/// Fails on an unknown provider name, a missing API key, or an unreachable
/// vector store, so a misconfigured server never starts accepting requests.
pub async fn build_state(config: &ContextConfig, pool: &PgPool) -> Result<HttpState, ContextError> {
    db::ensure_schema(pool).await?;

    let llm: Arc<dyn ChatModel> = Arc::from(create_chat_model(&config.llm)?);
    let retriever = connect_retriever(&config.vector_store, pool).await?;
    let log_store = create_log_store(&config.log_storage, pool)?;

    let pipeline = RagPipeline::new(
        Arc::new(retriever),
        Arc::new(PgChunkStore::new(pool.clone())),
        llm,
    );

    let blobs = match S3BlobStore::from_config(&config.object_storage).await {
        Some(store) => {
            tracing::info!(bucket = store.bucket(), "Object storage configured");
            Some(Arc::new(store) as Arc<dyn BlobStore>)
        }
        None => {
            tracing::warn!("Object storage credentials not set; document endpoint disabled");
            None
        }
    };

    Ok(HttpState {
        queries: Arc::new(QueryService::new(pipeline, log_store)),
        blobs,
    })
}
