use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memory engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the in-process hybrid (lexical + vector) memory engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEngineConfig {
    /// Target chunk size, in characters, when splitting a source document.
    #[serde(default = "d_chunk_chars")]
    pub chunk_chars: usize,
    /// Overlap between consecutive chunks, in characters.
    #[serde(default = "d_chunk_overlap")]
    pub chunk_overlap_chars: usize,
    /// Weight given to the vector-similarity score in the hybrid merge
    /// (`0.0` = lexical only, `1.0` = vector only).
    #[serde(default = "d_vector_weight")]
    pub vector_weight: f64,
    /// Multiplicative boost applied to personal-scope hits over global ones
    /// when a `user_id` is present on the search.
    #[serde(default = "d_personal_boost")]
    pub personal_boost: f64,
    /// How often the workspace watcher checks tracked documents for content
    /// hash changes.
    #[serde(default = "d_watch_ms")]
    pub watch_interval_ms: u64,
    /// Maximum size of the embedding cache (content-hash keyed).
    #[serde(default = "d_embedding_cache_size")]
    pub embedding_cache_size: usize,
    /// Default identity used when a search/ingest call does not specify a
    /// `user_id` for personal-scope memory.
    #[serde(default = "d_default_user_id")]
    pub default_user_id: String,
}

impl Default for MemoryEngineConfig {
    fn default() -> Self {
        Self {
            chunk_chars: 1_200,
            chunk_overlap_chars: 150,
            vector_weight: 0.6,
            personal_boost: 1.2,
            watch_interval_ms: 5_000,
            embedding_cache_size: 10_000,
            default_user_id: d_default_user_id(),
        }
    }
}

fn d_chunk_chars() -> usize {
    1_200
}
fn d_chunk_overlap() -> usize {
    150
}
fn d_vector_weight() -> f64 {
    0.6
}
fn d_personal_boost() -> f64 {
    1.2
}
fn d_watch_ms() -> u64 {
    5_000
}
fn d_embedding_cache_size() -> usize {
    10_000
}
fn d_default_user_id() -> String {
    "default_user".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vector_weight_favors_vector_slightly() {
        let config = MemoryEngineConfig::default();
        assert!(config.vector_weight > 0.5);
    }
}
