//! Question answering pipeline.
//!
//! [`RagPipeline`] runs retrieve → enrich → prompt → LLM for one question and
//! returns the answer with the trace of what happened. [`QueryService`] wraps
//! it with query id assignment and log persistence.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chunks::ChunkStore;
use crate::error::{ContextError, Result};
use crate::llm::ChatModel;
use crate::logs::LogStore;
use crate::models::{QueryRecord, VectorMatch};
use crate::prompt::{format_context, format_match_listing, render_prompt, NO_CONTEXT};
use crate::trace::{Trace, TraceEntry, TraceStep};
use crate::vector::Retriever;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub answer: String,
    pub trace: Vec<TraceEntry>,
}

pub struct RagPipeline {
    retriever: Arc<dyn Retriever>,
    chunks: Arc<dyn ChunkStore>,
    llm: Arc<dyn ChatModel>,
}

impl RagPipeline {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        chunks: Arc<dyn ChunkStore>,
        llm: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            retriever,
            chunks,
            llm,
        }
    }

    pub async fn invoke(&self, question: &str) -> Result<PipelineOutput> {
        let mut trace = Trace::new();
        trace.record(TraceStep::QueryReceived, format!("Received query: {}", question));

        let matches = self.retrieve(question, &mut trace).await?;
        let context = self.build_context(&matches, &mut trace).await?;

        let prompt = render_prompt(&context, question);
        trace.record_with_detail(
            TraceStep::PromptConstructed,
            format!("Prompt constructed ({} chars)", prompt.len()),
            prompt.as_str(),
        );

        trace.record(
            TraceStep::LlmInvoked,
            format!(
                "Invoking {} model {}",
                self.llm.provider(),
                self.llm.model()
            ),
        );
        let answer = self.llm.complete(&prompt).await?;
        tracing::info!(
            provider = %self.llm.provider(),
            answer_chars = answer.len(),
            "LLM answered"
        );

        Ok(PipelineOutput {
            answer,
            trace: trace.into_entries(),
        })
    }

    async fn retrieve(&self, question: &str, trace: &mut Trace) -> Result<Vec<VectorMatch>> {
        let matches = self.retriever.similarity_search(question).await?;
        tracing::info!(matches = matches.len(), "Similarity search complete");

        if matches.is_empty() {
            trace.record(TraceStep::NoMatches, "No matching documents found");
        } else {
            trace.record_with_detail(
                TraceStep::MatchesRetrieved,
                format!("Retrieved {} matching chunks", matches.len()),
                format_match_listing(&matches),
            );
        }
        Ok(matches)
    }

    async fn build_context(&self, matches: &[VectorMatch], trace: &mut Trace) -> Result<String> {
        if matches.is_empty() {
            return Ok(NO_CONTEXT.to_string());
        }

        let chunk_ids: Vec<String> = matches
            .iter()
            .filter_map(|m| m.chunk_id())
            .map(str::to_string)
            .collect();

        let chunks = self.chunks.fetch_chunks(&chunk_ids).await?;
        tracing::info!(
            requested = chunk_ids.len(),
            fetched = chunks.len(),
            "Chunk content fetched"
        );
        trace.record(
            TraceStep::ContentFetched,
            format!(
                "Fetched content for {} of {} chunks",
                chunks.len(),
                chunk_ids.len()
            ),
        );

        Ok(format_context(&chunks))
    }
}

// ============================================================================
// Query service
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub query_id: Uuid,
    pub answer: String,
    pub logs: Vec<TraceEntry>,
}

pub struct QueryService {
    pipeline: RagPipeline,
    log_store: Arc<dyn LogStore>,
}

impl QueryService {
    pub fn new(pipeline: RagPipeline, log_store: Arc<dyn LogStore>) -> Self {
        Self {
            pipeline,
            log_store,
        }
    }

    /// Answer `question` under a fresh query id and persist the result.
    /// Nothing is stored when any stage fails.
    pub async fn ask(&self, question: &str) -> Result<AskResponse> {
        let query_id = Uuid::new_v4();
        tracing::info!(query_id = %query_id, "Processing query");

        let output = self.pipeline.invoke(question).await.map_err(|e| {
            tracing::error!(query_id = %query_id, error = %e, "Query failed");
            e
        })?;

        let record = QueryRecord {
            query_id,
            query: question.to_string(),
            answer: output.answer,
            logs: output.trace,
            created_at: Utc::now(),
        };
        self.log_store.save(&record).await?;

        Ok(AskResponse {
            query_id,
            answer: record.answer,
            logs: record.logs,
        })
    }

    pub async fn get_logs(&self, query_id: Uuid) -> Result<QueryRecord> {
        self.log_store
            .get(query_id)
            .await?
            .ok_or_else(|| ContextError::NotFound(format!("Query {}", query_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, LlmProvider};
    use crate::logs::MemoryLogStore;
    use crate::models::Chunk;
    use crate::vector::VectorStoreError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedRetriever(Vec<VectorMatch>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn similarity_search(
            &self,
            _query: &str,
        ) -> std::result::Result<Vec<VectorMatch>, VectorStoreError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingChunks {
        calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl ChunkStore for RecordingChunks {
        async fn fetch_chunks(
            &self,
            chunk_ids: &[String],
        ) -> std::result::Result<Vec<Chunk>, sqlx::Error> {
            self.calls.lock().unwrap().push(chunk_ids.to_vec());
            Ok(chunk_ids
                .iter()
                .filter(|id| id.as_str() != "missing")
                .map(|id| Chunk {
                    chunk_id: id.clone(),
                    document_id: "d1".to_string(),
                    content: format!("content of {}", id),
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct EchoModel {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                return Err(LlmError::EmptyResponse(LlmProvider::OpenAi));
            }
            Ok("the answer".to_string())
        }

        fn provider(&self) -> LlmProvider {
            LlmProvider::OpenAi
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    fn hit(chunk_id: &str, score: f32) -> VectorMatch {
        VectorMatch {
            point_id: format!("p-{}", chunk_id),
            score,
            metadata: json!({ "metadata": { "chunk_id": chunk_id, "document_id": "d1" } }),
        }
    }

    fn steps(trace: &[TraceEntry]) -> Vec<TraceStep> {
        trace.iter().map(|e| e.step).collect()
    }

    #[tokio::test]
    async fn test_pipeline_with_matches_records_every_stage() {
        let chunks = Arc::new(RecordingChunks::default());
        let llm = Arc::new(EchoModel::default());
        let pipeline = RagPipeline::new(
            Arc::new(FixedRetriever(vec![hit("c1", 0.9), hit("missing", 0.5), hit("c2", 0.4)])),
            chunks.clone(),
            llm.clone(),
        );

        let output = pipeline.invoke("What is X?").await.unwrap();

        assert_eq!(output.answer, "the answer");
        assert_eq!(
            steps(&output.trace),
            vec![
                TraceStep::QueryReceived,
                TraceStep::MatchesRetrieved,
                TraceStep::ContentFetched,
                TraceStep::PromptConstructed,
                TraceStep::LlmInvoked,
            ]
        );
        assert_eq!(
            chunks.calls.lock().unwrap().as_slice(),
            &[vec!["c1".to_string(), "missing".to_string(), "c2".to_string()]]
        );

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("--- Document ID: d1 | Chunk ID: c1 ---\ncontent of c1"));
        assert!(prompts[0].contains("content of c2"));
        assert!(!prompts[0].contains("content of missing"));
        assert_eq!(output.trace[3].detail.as_deref(), Some(prompts[0].as_str()));
    }

    #[tokio::test]
    async fn test_pipeline_without_matches_uses_placeholder() {
        let chunks = Arc::new(RecordingChunks::default());
        let llm = Arc::new(EchoModel::default());
        let pipeline =
            RagPipeline::new(Arc::new(FixedRetriever(vec![])), chunks.clone(), llm.clone());

        let output = pipeline.invoke("What is X?").await.unwrap();

        assert_eq!(
            steps(&output.trace),
            vec![
                TraceStep::QueryReceived,
                TraceStep::NoMatches,
                TraceStep::PromptConstructed,
                TraceStep::LlmInvoked,
            ]
        );
        assert!(chunks.calls.lock().unwrap().is_empty());
        assert!(llm.prompts.lock().unwrap()[0].contains(NO_CONTEXT));
    }

    #[tokio::test]
    async fn test_service_persists_answered_query() {
        let store = Arc::new(MemoryLogStore::new());
        let service = QueryService::new(
            RagPipeline::new(
                Arc::new(FixedRetriever(vec![hit("c1", 0.8)])),
                Arc::new(RecordingChunks::default()),
                Arc::new(EchoModel::default()),
            ),
            store.clone(),
        );

        let response = service.ask("What is X?").await.unwrap();
        let record = service.get_logs(response.query_id).await.unwrap();

        assert_eq!(record.query, "What is X?");
        assert_eq!(record.answer, response.answer);
        assert_eq!(record.logs, response.logs);
    }

    #[tokio::test]
    async fn test_service_does_not_persist_failed_query() {
        let store = Arc::new(MemoryLogStore::new());
        let service = QueryService::new(
            RagPipeline::new(
                Arc::new(FixedRetriever(vec![])),
                Arc::new(RecordingChunks::default()),
                Arc::new(EchoModel {
                    fail: true,
                    ..Default::default()
                }),
            ),
            store.clone(),
        );

        assert!(matches!(
            service.ask("What is X?").await,
            Err(ContextError::Llm(LlmError::EmptyResponse(_)))
        ));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_get_logs_unknown_id_is_not_found() {
        let service = QueryService::new(
            RagPipeline::new(
                Arc::new(FixedRetriever(vec![])),
                Arc::new(RecordingChunks::default()),
                Arc::new(EchoModel::default()),
            ),
            Arc::new(MemoryLogStore::new()),
        );
        assert!(matches!(
            service.get_logs(Uuid::new_v4()).await,
            Err(ContextError::NotFound(_))
        ));
    }
}
