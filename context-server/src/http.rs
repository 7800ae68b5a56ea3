//! Context Engine HTTP REST API
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, serde_json::Value)`, so the behaviour can be tested
//! without going through the router.
//!
//! Endpoints:
//! - GET  /health                        : liveness
//! - GET  /version                       : server version info
//! - POST /api/v1/ask                    : answer a question, returns the trace
//! - GET  /api/v1/logs/:query_id         : replay a stored query
//! - GET  /api/v1/documents/:document_id : raw document from object storage

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use context_core::config::HttpConfig;
use context_core::{BlobStore, BlobStoreError, ContextError, QueryService};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub queries: Arc<QueryService>,
    /// `None` when object storage credentials are not configured.
    pub blobs: Option<Arc<dyn BlobStore>>,
}

pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/api/v1/ask", post(ask_handler))
        .route("/api/v1/logs/:query_id", get(logs_handler))
        .route("/api/v1/documents/:document_id", get(document_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    config: &HttpConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Context Engine HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: Option<String>,
}

fn error_body(detail: impl Into<String>) -> serde_json::Value {
    serde_json::json!({
        "detail": detail.into(),
        "status": "error",
    })
}

fn ok_body<T: Serialize>(value: &T) -> (StatusCode, serde_json::Value) {
    match serde_json::to_value(value).map_err(ContextError::from) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            tracing::error!(error = %e, "Response encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string()))
        }
    }
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

pub fn health_inner() -> serde_json::Value {
    serde_json::json!({ "status": "ok" })
}

pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "api": "v1",
    })
}

pub async fn ask_inner(service: &QueryService, req: AskRequest) -> (StatusCode, serde_json::Value) {
    let query = match req.query {
        Some(q) if !q.trim().is_empty() => q,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                error_body("query field is required"),
            );
        }
    };

    let start = Instant::now();
    match service.ask(&query).await {
        Ok(response) => {
            tracing::info!(
                query_id = %response.query_id,
                took_ms = start.elapsed().as_millis() as u64,
                "Query answered"
            );
            ok_body(&response)
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string())),
    }
}

pub async fn logs_inner(service: &QueryService, query_id: &str) -> (StatusCode, serde_json::Value) {
    // A malformed id can never have been issued.
    let query_id = match Uuid::parse_str(query_id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::NOT_FOUND,
                error_body(format!("Query {} not found", query_id)),
            );
        }
    };

    match service.get_logs(query_id).await {
        Ok(record) => ok_body(&record),
        Err(ContextError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            error_body(format!("Query {} not found", query_id)),
        ),
        Err(e) => {
            tracing::error!(query_id = %query_id, error = %e, "Log lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string()))
        }
    }
}

pub async fn document_inner(
    blobs: Option<&dyn BlobStore>,
    document_id: &str,
) -> (StatusCode, serde_json::Value) {
    let Some(blobs) = blobs else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            error_body(BlobStoreError::NotConfigured.to_string()),
        );
    };

    match blobs.fetch_raw(document_id).await {
        Ok(bytes) => (
            StatusCode::OK,
            serde_json::json!({
                "document_id": document_id,
                "content": String::from_utf8_lossy(&bytes),
            }),
        ),
        Err(BlobStoreError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            error_body(format!("Document {} not found", document_id)),
        ),
        Err(e) => {
            tracing::error!(document_id = %document_id, error = %e, "Document fetch failed");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string()))
        }
    }
}

// ============================================================================
// Axum handler wrappers
// ============================================================================

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(health_inner()))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn ask_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<AskRequest>,
) -> impl IntoResponse {
    let (status, body) = ask_inner(&state.queries, req).await;
    (status, Json(body))
}

pub async fn logs_handler(
    State(state): State<Arc<HttpState>>,
    Path(query_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = logs_inner(&state.queries, &query_id).await;
    (status, Json(body))
}

pub async fn document_handler(
    State(state): State<Arc<HttpState>>,
    Path(document_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = document_inner(state.blobs.as_deref(), &document_id).await;
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use context_core::llm::{ChatModel, LlmError, LlmProvider};
    use context_core::models::{Chunk, VectorMatch};
    use context_core::vector::{Retriever, VectorStoreError};
    use context_core::{ChunkStore, MemoryLogStore, RagPipeline};

    struct NoMatches;

    #[async_trait]
    impl Retriever for NoMatches {
        async fn similarity_search(
            &self,
            _query: &str,
        ) -> std::result::Result<Vec<VectorMatch>, VectorStoreError> {
            Ok(vec![])
        }
    }

    struct NoChunks;

    #[async_trait]
    impl ChunkStore for NoChunks {
        async fn fetch_chunks(
            &self,
            _chunk_ids: &[String],
        ) -> std::result::Result<Vec<Chunk>, sqlx::Error> {
            Ok(vec![])
        }
    }

    struct FixedModel(std::result::Result<&'static str, u16>);

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn complete(&self, _prompt: &str) -> std::result::Result<String, LlmError> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(code) => Err(LlmError::Api {
                    provider: LlmProvider::OpenAi,
                    code,
                    message: "upstream failure".to_string(),
                }),
            }
        }

        fn provider(&self) -> LlmProvider {
            LlmProvider::OpenAi
        }

        fn model(&self) -> &str {
            "fixed"
        }
    }

    fn service(model: FixedModel) -> QueryService {
        QueryService::new(
            RagPipeline::new(Arc::new(NoMatches), Arc::new(NoChunks), Arc::new(model)),
            Arc::new(MemoryLogStore::new()),
        )
    }

    struct MapBlobs;

    #[async_trait]
    impl BlobStore for MapBlobs {
        async fn fetch_raw(&self, document_id: &str) -> std::result::Result<Vec<u8>, BlobStoreError> {
            match document_id {
                "d1" => Ok(b"raw text of d1".to_vec()),
                "broken" => Err(BlobStoreError::Sdk("connection reset".to_string())),
                other => Err(BlobStoreError::NotFound(other.to_string())),
            }
        }
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(<S::Error as serde::ser::Error>::custom("unsupported value"))
        }
    }

    #[test]
    fn test_ok_body_maps_encoding_failure_to_500() {
        let (status, body) = ok_body(&Unencodable);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert_eq!(body["detail"], "Serialization error: unsupported value");

        let (status, body) = ok_body(&serde_json::json!({ "answer": "A letter." }));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "A letter.");
    }

    #[test]
    fn test_health_inner_is_ok() {
        assert_eq!(health_inner(), serde_json::json!({ "status": "ok" }));
    }

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert_eq!(v["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(v["api"], "v1");
    }

    #[tokio::test]
    async fn test_ask_inner_rejects_blank_query() {
        let svc = service(FixedModel(Ok("unused")));
        for query in [None, Some(String::new()), Some("   ".to_string())] {
            let (status, body) = ask_inner(&svc, AskRequest { query }).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["status"], "error");
            assert!(body["detail"].is_string());
        }
    }

    #[tokio::test]
    async fn test_ask_inner_returns_answer_and_logs() {
        let svc = service(FixedModel(Ok("I don't know.")));
        let (status, body) = ask_inner(
            &svc,
            AskRequest {
                query: Some("What is X?".to_string()),
            },
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "I don't know.");
        assert!(Uuid::parse_str(body["query_id"].as_str().unwrap()).is_ok());
        assert_eq!(body["logs"][0]["step"], "query_received");
        assert_eq!(body["logs"][1]["step"], "no_matches");
    }

    #[tokio::test]
    async fn test_ask_inner_maps_llm_failure_to_500() {
        let svc = service(FixedModel(Err(503)));
        let (status, body) = ask_inner(
            &svc,
            AskRequest {
                query: Some("What is X?".to_string()),
            },
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert!(body["detail"].as_str().unwrap().contains("upstream failure"));
    }

    #[tokio::test]
    async fn test_logs_inner_round_trip_and_misses() {
        let svc = service(FixedModel(Ok("answer")));
        let (_, asked) = ask_inner(
            &svc,
            AskRequest {
                query: Some("What is X?".to_string()),
            },
        )
        .await;
        let id = asked["query_id"].as_str().unwrap();

        let (status, body) = logs_inner(&svc, id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["query"], "What is X?");
        assert_eq!(body["logs"], asked["logs"]);

        let (status, _) = logs_inner(&svc, &Uuid::new_v4().to_string()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = logs_inner(&svc, "not-a-uuid").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_document_inner_statuses() {
        let (status, _) = document_inner(None, "d1").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let blobs = MapBlobs;
        let (status, body) = document_inner(Some(&blobs), "d1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content"], "raw text of d1");

        let (status, _) = document_inner(Some(&blobs), "d9").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = document_inner(Some(&blobs), "broken").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
