use serde::{Deserialize, Serialize};

/// A similarity hit returned by the vector store. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub point_id: String,
    pub score: f32,
    pub metadata: serde_json::Value,
}

impl VectorMatch {
    pub fn chunk_id(&self) -> Option<&str> {
        self.metadata_str("chunk_id")
    }

    pub fn document_id(&self) -> Option<&str> {
        self.metadata_str("document_id")
    }

    // Stored payloads nest the fields under `metadata`; flat payloads are accepted too.
    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get("metadata")
            .and_then(|m| m.get(key))
            .or_else(|| self.metadata.get(key))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}
