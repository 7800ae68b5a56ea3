use serde::{Deserialize, Serialize};

/// A unit of document text stored in `document_chunks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
}
