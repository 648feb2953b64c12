use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chunk of indexed text held by the memory engine, with an optional
/// embedding for vector search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryChunk {
    pub id: uuid::Uuid,
    /// Path of the source document this chunk was split from.
    pub path: String,
    /// Logical source identifier (e.g. "workspace", "conversation").
    pub source: String,
    pub scope: MemoryScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub text: String,
    /// 1-indexed line range of this chunk within the source document.
    pub start_line: usize,
    pub end_line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Whether a chunk belongs to the agent's shared workspace knowledge or a
/// specific user's personal memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryScope {
    Global,
    Personal,
}

/// A source document tracked by the memory engine's change detector —
/// re-chunked only when its content hash changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSource {
    pub path: String,
    pub source: String,
    pub scope: MemoryScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub content_hash: String,
    pub mtime: DateTime<Utc>,
    pub size: u64,
    pub last_indexed_at: DateTime<Utc>,
}
