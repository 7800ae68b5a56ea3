//! Request-scoped trace of pipeline steps.
//!
//! A [`Trace`] is created per question, passed by `&mut` through each stage of
//! the pipeline and handed back with the answer. Entries can only be appended.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStep {
    QueryReceived,
    NoMatches,
    MatchesRetrieved,
    ContentFetched,
    PromptConstructed,
    LlmInvoked,
}

impl TraceStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceStep::QueryReceived => "query_received",
            TraceStep::NoMatches => "no_matches",
            TraceStep::MatchesRetrieved => "matches_retrieved",
            TraceStep::ContentFetched => "content_fetched",
            TraceStep::PromptConstructed => "prompt_constructed",
            TraceStep::LlmInvoked => "llm_invoked",
        }
    }
}

impl fmt::Display for TraceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step: TraceStep,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Default)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: TraceStep, message: impl Into<String>) {
        self.push(step, message.into(), None);
    }

    pub fn record_with_detail(
        &mut self,
        step: TraceStep,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.push(step, message.into(), Some(detail.into()));
    }

    fn push(&mut self, step: TraceStep, message: String, detail: Option<String>) {
        tracing::debug!(step = %step, message = %message, "trace");
        self.entries.push(TraceEntry {
            step,
            message,
            detail,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<TraceEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_insertion_order() {
        let mut trace = Trace::new();
        assert!(trace.is_empty());

        trace.record(TraceStep::QueryReceived, "Received query");
        trace.record_with_detail(TraceStep::PromptConstructed, "Prompt built", "full prompt");

        assert_eq!(trace.len(), 2);
        let entries = trace.into_entries();
        assert_eq!(entries[0].step, TraceStep::QueryReceived);
        assert!(entries[0].detail.is_none());
        assert_eq!(entries[1].step, TraceStep::PromptConstructed);
        assert_eq!(entries[1].detail.as_deref(), Some("full prompt"));
    }

    #[test]
    fn test_entry_serializes_snake_case_and_omits_empty_detail() {
        let entry = TraceEntry {
            step: TraceStep::MatchesRetrieved,
            message: "2 matches".to_string(),
            detail: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["step"], "matches_retrieved");
        assert!(json.get("detail").is_none());

        let back: TraceEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_display_matches_serialized_name() {
        for step in [
            TraceStep::QueryReceived,
            TraceStep::NoMatches,
            TraceStep::MatchesRetrieved,
            TraceStep::ContentFetched,
            TraceStep::PromptConstructed,
            TraceStep::LlmInvoked,
        ] {
            let json = serde_json::to_value(step).unwrap();
            assert_eq!(json, step.to_string());
        }
    }
}
