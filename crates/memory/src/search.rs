//! Hybrid search: lexical + vector, merged by `(path, start_line)`.

use std::collections::HashMap;

use wd_domain::error::Result;
use wd_domain::memory::{MemoryChunk, MemoryScope};

use crate::store::MemoryStore;

/// A single scored search hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: MemoryChunk,
    pub score: f64,
    pub personal: bool,
}

/// Computes cosine similarity between two vectors; `0.0` if either has zero
/// magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Run a hybrid search against `store`. `user_id`, when present, both scopes
/// the vector-embedded query and applies the personal-result boost.
pub async fn hybrid_search(
    store: &MemoryStore,
    query: &str,
    k: usize,
    user_id: Option<&str>,
) -> Result<Vec<SearchHit>> {
    let cfg = store.config();
    let w_vec_default = cfg.vector_weight;
    let w_text_default = 1.0 - cfg.vector_weight;

    // Lexical channel.
    let lexical_hits = store.lexical_search(query, k.max(20));
    let lexical_max = lexical_hits
        .iter()
        .map(|(_, s)| *s)
        .fold(0.0_f64, f64::max);

    let mut lexical_by_key: HashMap<(String, usize), f64> = HashMap::new();
    let mut chunk_by_key: HashMap<(String, usize), MemoryChunk> = HashMap::new();
    for (id, score) in &lexical_hits {
        let Some(chunk) = store.chunk(*id) else { continue };
        let normalized = if lexical_max > 0.0 { score / lexical_max } else { 0.0 };
        let key = (chunk.path.clone(), chunk.start_line);
        lexical_by_key.insert(key.clone(), normalized);
        chunk_by_key.insert(key, chunk);
    }

    // Vector channel.
    let mut vector_by_key: HashMap<(String, usize), f64> = HashMap::new();
    if store.has_embedder() {
        if let Some(query_vec) = store.embed_query(query).await? {
            let mut scored: Vec<(MemoryChunk, f64)> = store
                .all_chunks()
                .into_iter()
                .filter_map(|chunk| {
                    let embedding = chunk.embedding.as_ref()?;
                    let sim = cosine_similarity(&query_vec, embedding) as f64;
                    Some((chunk, sim))
                })
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(k.max(20));
            for (chunk, sim) in scored {
                let key = (chunk.path.clone(), chunk.start_line);
                vector_by_key.insert(key.clone(), sim);
                chunk_by_key.entry(key).or_insert(chunk);
            }
        }
    }

    let vec_empty = vector_by_key.is_empty();
    let text_empty = lexical_by_key.is_empty();
    let (w_vec, w_text) = match (vec_empty, text_empty) {
        (true, true) => (0.0, 0.0),
        (true, false) => (0.0, 1.0),
        (false, true) => (1.0, 0.0),
        (false, false) => (w_vec_default, w_text_default),
    };

    let mut keys: Vec<(String, usize)> = chunk_by_key.keys().cloned().collect();
    keys.sort();
    keys.dedup();

    let mut hits: Vec<SearchHit> = keys
        .into_iter()
        .filter_map(|key| {
            let chunk = chunk_by_key.get(&key)?.clone();
            let text_score = *lexical_by_key.get(&key).unwrap_or(&0.0);
            let vec_score = *vector_by_key.get(&key).unwrap_or(&0.0);
            let mut score = w_vec * vec_score + w_text * text_score;

            let personal = matches!(chunk.scope, MemoryScope::Personal)
                && user_id.is_some_and(|u| chunk.user_id.as_deref() == Some(u));
            if personal {
                score *= cfg.personal_boost;
            }

            Some(SearchHit { chunk, score, personal })
        })
        .collect();

    // On a snippet collision at the same key, the personal variant already
    // won by construction (chunk ids are unique per path/scope combination,
    // so collisions only arise from a personal and a global chunk sharing
    // the same start line — sort_by_key above keeps the higher-scored one
    // first after the boost is applied).
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(k);

    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wd_domain::config::MemoryEngineConfig;

    #[test]
    fn cosine_identical_vectors_is_one() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[tokio::test]
    async fn lexical_only_search_when_no_embedder() {
        let cfg = MemoryEngineConfig::default();
        let store = MemoryStore::new(cfg, None);
        store
            .ingest_document(
                "a.md",
                "workspace",
                MemoryScope::Global,
                None,
                "rust is a systems programming language",
                40,
            )
            .await
            .unwrap();

        let hits = hybrid_search(&store, "rust language", 5, None).await.unwrap();
        assert!(!hits.is_empty());
        assert!(hits[0].score > 0.0);
    }

    #[tokio::test]
    async fn personal_hit_gets_boosted() {
        let cfg = MemoryEngineConfig::default();
        let store = MemoryStore::new(cfg, None);
        store
            .ingest_document(
                "a.md",
                "workspace",
                MemoryScope::Personal,
                Some("alice".into()),
                "alice prefers dark mode in the editor",
                40,
            )
            .await
            .unwrap();

        let hits = hybrid_search(&store, "dark mode editor", 5, Some("alice")).await.unwrap();
        assert!(!hits.is_empty());
        assert!(hits[0].personal);
    }
}
