//! Hybrid (lexical + vector) in-process memory store.
//!
//! Holds a chunk table alongside a parallel lexical index; upserts and
//! path-deletes touch both. Vector search is only available when an
//! embedding provider is configured. See [`crate::search`] for the hybrid
//! merge that combines both channels.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use wd_domain::config::MemoryEngineConfig;
use wd_domain::error::Result;
use wd_domain::memory::{DocumentSource, MemoryChunk, MemoryScope};
use wd_providers::{EmbeddingsRequest, LlmProvider};

use crate::chunker::chunk_text;
use crate::embedding_cache::EmbeddingCache;
use crate::lexical::LexicalIndex;

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The in-process memory engine's storage layer.
pub struct MemoryStore {
    config: MemoryEngineConfig,
    embedder: Option<Arc<dyn LlmProvider>>,
    embedding_model: Option<String>,
    embedding_provider_name: String,

    chunks: RwLock<HashMap<Uuid, MemoryChunk>>,
    chunks_by_path: RwLock<HashMap<String, Vec<Uuid>>>,
    documents: RwLock<HashMap<String, DocumentSource>>,
    lexical: RwLock<LexicalIndex>,
    embedding_cache: EmbeddingCache,
}

impl MemoryStore {
    pub fn new(config: MemoryEngineConfig, embedder: Option<Arc<dyn LlmProvider>>) -> Self {
        let embedding_cache_size = config.embedding_cache_size;
        Self {
            config,
            embedder,
            embedding_model: None,
            embedding_provider_name: "embedder".into(),
            chunks: RwLock::new(HashMap::new()),
            chunks_by_path: RwLock::new(HashMap::new()),
            documents: RwLock::new(HashMap::new()),
            lexical: RwLock::new(LexicalIndex::new()),
            embedding_cache: EmbeddingCache::new(embedding_cache_size),
        }
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn config(&self) -> &MemoryEngineConfig {
        &self.config
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn document_count(&self) -> usize {
        self.documents.read().len()
    }

    /// Re-index `text` under `path` if its content hash differs from what's
    /// on record. Returns `None` when the hash matched and indexing was
    /// skipped, or `Some(chunk_count)` when (re-)indexed.
    pub async fn ingest_document(
        &self,
        path: &str,
        source: &str,
        scope: MemoryScope,
        user_id: Option<String>,
        text: &str,
        size: u64,
    ) -> Result<Option<usize>> {
        let hash = content_hash(text);

        if let Some(existing) = self.documents.read().get(path) {
            if existing.content_hash == hash {
                return Ok(None);
            }
        }

        self.delete_path(path);

        let raw_chunks = chunk_text(text, self.config.chunk_chars, self.config.chunk_overlap_chars);
        let mut ids = Vec::with_capacity(raw_chunks.len());

        for raw in &raw_chunks {
            let chunk_hash = content_hash(&raw.text);
            let embedding = self.embed_chunk(&chunk_hash, &raw.text).await?;

            let chunk = MemoryChunk {
                id: Uuid::new_v4(),
                path: path.to_string(),
                source: source.to_string(),
                scope,
                user_id: user_id.clone(),
                text: raw.text.clone(),
                start_line: raw.start_line,
                end_line: raw.end_line,
                embedding,
                content_hash: chunk_hash,
                created_at: Utc::now(),
            };

            ids.push(chunk.id);
            self.lexical.write().upsert(chunk.id, &chunk.text);
            self.chunks.write().insert(chunk.id, chunk);
        }

        self.chunks_by_path.write().insert(path.to_string(), ids);
        self.documents.write().insert(
            path.to_string(),
            DocumentSource {
                path: path.to_string(),
                source: source.to_string(),
                scope,
                user_id,
                content_hash: hash,
                mtime: Utc::now(),
                size,
                last_indexed_at: Utc::now(),
            },
        );

        Ok(Some(raw_chunks.len()))
    }

    /// Remove all chunks and the document record for `path`. Returns the
    /// number of chunks removed.
    pub fn delete_path(&self, path: &str) -> usize {
        let ids = self.chunks_by_path.write().remove(path).unwrap_or_default();
        let removed = ids.len();
        if removed > 0 {
            let mut chunks = self.chunks.write();
            let mut lexical = self.lexical.write();
            for id in ids {
                chunks.remove(&id);
                lexical.remove(id);
            }
        }
        self.documents.write().remove(path);
        removed
    }

    pub fn document(&self, path: &str) -> Option<DocumentSource> {
        self.documents.read().get(path).cloned()
    }

    pub fn all_chunks(&self) -> Vec<MemoryChunk> {
        self.chunks.read().values().cloned().collect()
    }

    pub fn lexical_search(&self, query: &str, k: usize) -> Vec<(Uuid, f64)> {
        self.lexical.read().search(query, k)
    }

    pub fn chunk(&self, id: Uuid) -> Option<MemoryChunk> {
        self.chunks.read().get(&id).cloned()
    }

    /// Embed `query` once for a vector search, using the same cache as
    /// ingest-time embedding.
    pub async fn embed_query(&self, query: &str) -> Result<Option<Vec<f32>>> {
        let Some(embedder) = &self.embedder else {
            return Ok(None);
        };
        let hash = content_hash(query);
        self.embed_with(embedder, &hash, query).await.map(Some)
    }

    async fn embed_chunk(&self, chunk_hash: &str, text: &str) -> Result<Option<Vec<f32>>> {
        let Some(embedder) = self.embedder.clone() else {
            return Ok(None);
        };
        self.embed_with(&embedder, chunk_hash, text).await.map(Some)
    }

    async fn embed_with(&self, embedder: &Arc<dyn LlmProvider>, hash: &str, text: &str) -> Result<Vec<f32>> {
        let model = self.embedding_model.clone().unwrap_or_default();
        if let Some(cached) = self.embedding_cache.get(hash, &self.embedding_provider_name, &model) {
            return Ok(cached);
        }
        let resp = embedder
            .embeddings(EmbeddingsRequest {
                input: vec![text.to_string()],
                model: self.embedding_model.clone(),
            })
            .await?;
        let vector = resp.embeddings.into_iter().next().unwrap_or_default();
        self.embedding_cache
            .put(hash, &self.embedding_provider_name, &model, vector.clone());
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> MemoryEngineConfig {
        MemoryEngineConfig {
            chunk_chars: 200,
            chunk_overlap_chars: 20,
            ..MemoryEngineConfig::default()
        }
    }

    #[tokio::test]
    async fn ingest_then_search_finds_chunk() {
        let store = MemoryStore::new(cfg(), None);
        let n = store
            .ingest_document(
                "notes.md",
                "workspace",
                MemoryScope::Global,
                None,
                "the quick brown fox\n\njumps over the lazy dog",
                40,
            )
            .await
            .unwrap();
        assert_eq!(n, Some(2));
        let hits = store.lexical_search("lazy dog", 5);
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn matching_hash_skips_reindex() {
        let store = MemoryStore::new(cfg(), None);
        let text = "stable content that does not change";
        store
            .ingest_document("a.md", "workspace", MemoryScope::Global, None, text, 10)
            .await
            .unwrap();
        let second = store
            .ingest_document("a.md", "workspace", MemoryScope::Global, None, text, 10)
            .await
            .unwrap();
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn changed_hash_reindexes() {
        let store = MemoryStore::new(cfg(), None);
        store
            .ingest_document("a.md", "workspace", MemoryScope::Global, None, "first version", 10)
            .await
            .unwrap();
        let updated = store
            .ingest_document(
                "a.md",
                "workspace",
                MemoryScope::Global,
                None,
                "second version, quite different text",
                20,
            )
            .await
            .unwrap();
        assert!(updated.is_some());
        assert!(store.lexical_search("first", 5).is_empty());
    }

    #[tokio::test]
    async fn delete_path_removes_chunks_and_document() {
        let store = MemoryStore::new(cfg(), None);
        store
            .ingest_document("a.md", "workspace", MemoryScope::Global, None, "some content here", 10)
            .await
            .unwrap();
        assert!(store.document("a.md").is_some());
        let removed = store.delete_path("a.md");
        assert!(removed > 0);
        assert!(store.document("a.md").is_none());
        assert_eq!(store.chunk_count(), 0);
    }
}
