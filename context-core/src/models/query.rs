use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trace::TraceEntry;

/// One answered question and the trace recorded while answering it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query_id: Uuid,
    pub query: String,
    pub answer: String,
    pub logs: Vec<TraceEntry>,
    pub created_at: DateTime<Utc>,
}
