use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completed sub-agent's result, waiting to be merged into its parent
/// session's context. Items from the same parent run are batched by the
/// announce queue's debounce window and delivered as one synthetic message.
///
/// `{subagent_id, label, status, result, runtime, iterations}` plus origin
/// info used to address the parent reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceItem {
    pub subagent_id: String,
    pub label: String,
    pub status: AnnounceStatus,
    pub result: String,
    /// Wall-clock run duration in milliseconds.
    pub runtime_ms: u64,
    pub iterations: u32,
    /// Where this item is delivered: the parent session it reports back to.
    pub parent_session_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnounceStatus {
    Completed,
    Errored,
    Cancelled,
}
