//! Qdrant REST client: just the calls the retriever needs.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::VectorStoreError;
use crate::models::VectorMatch;

// ============================================================================
// Qdrant API structs (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest {
    vectors: VectorParams,
}

#[derive(Debug, Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: u32,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: serde_json::Value,
    score: f32,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct QdrantErrorResponse {
    status: Option<QdrantErrorStatus>,
}

#[derive(Debug, Deserialize)]
struct QdrantErrorStatus {
    error: String,
}

// ============================================================================
// QdrantClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct QdrantClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
}

impl QdrantClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        collection: &str,
    ) -> Result<Self, VectorStoreError> {
        if collection.trim().is_empty() {
            return Err(VectorStoreError::InvalidCollectionName(collection.to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            collection: collection.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/collections/{}{}", self.base_url, self.collection, path);
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, VectorStoreError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<QdrantErrorResponse>(&body)
                .ok()
                .and_then(|e| e.status)
                .map(|s| s.error)
                .unwrap_or(body);

            tracing::error!(code = status.as_u16(), message = %message, "Qdrant API error");

            return Err(VectorStoreError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let parsed: QdrantResponse<T> = response.json().await?;
        Ok(parsed.result)
    }

    pub async fn collection_exists(&self) -> Result<bool, VectorStoreError> {
        let result: ExistsResult = self.send(self.request(Method::GET, "/exists")).await?;
        Ok(result.exists)
    }

    pub async fn create_collection(&self, dimensions: usize) -> Result<(), VectorStoreError> {
        let body = CreateCollectionRequest {
            vectors: VectorParams {
                size: dimensions,
                distance: "Cosine",
            },
        };
        let _: bool = self.send(self.request(Method::PUT, "").json(&body)).await?;
        Ok(())
    }

    /// Returns `true` when the collection had to be created.
    pub async fn ensure_collection(&self, dimensions: usize) -> Result<bool, VectorStoreError> {
        if self.collection_exists().await? {
            return Ok(false);
        }
        self.create_collection(dimensions).await?;
        Ok(true)
    }

    pub async fn search(
        &self,
        vector: &[f32],
        limit: u32,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };

        let points: Vec<ScoredPoint> = self
            .send(self.request(Method::POST, "/points/search").json(&body))
            .await?;

        Ok(points
            .into_iter()
            .map(|p| VectorMatch {
                point_id: match p.id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                },
                score: p.score,
                metadata: p.payload.unwrap_or(serde_json::Value::Null),
            })
            .collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================
