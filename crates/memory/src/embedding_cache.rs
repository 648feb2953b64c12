//! Embedding cache keyed by `{content_hash, provider, model}`.
//!
//! Populated opportunistically as chunks are embedded; a cache hit avoids a
//! redundant embeddings call when the same content is re-indexed under an
//! unchanged provider/model pair.

use std::collections::HashMap;

use parking_lot::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    content_hash: String,
    provider: String,
    model: String,
}

pub struct EmbeddingCache {
    entries: RwLock<HashMap<CacheKey, Vec<f32>>>,
    order: RwLock<Vec<CacheKey>>,
    capacity: usize,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
            capacity,
        }
    }

    pub fn get(&self, content_hash: &str, provider: &str, model: &str) -> Option<Vec<f32>> {
        let key = CacheKey {
            content_hash: content_hash.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
        };
        self.entries.read().get(&key).cloned()
    }

    pub fn put(&self, content_hash: &str, provider: &str, model: &str, embedding: Vec<f32>) {
        if self.capacity == 0 {
            return;
        }
        let key = CacheKey {
            content_hash: content_hash.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
        };
        let mut entries = self.entries.write();
        let mut order = self.order.write();

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            // Evict oldest.
            if !order.is_empty() {
                let evicted = order.remove(0);
                entries.remove(&evicted);
            }
        }
        if !entries.contains_key(&key) {
            order.push(key.clone());
        }
        entries.insert(key, embedding);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_hits() {
        let cache = EmbeddingCache::new(10);
        cache.put("hash1", "openai", "text-embedding-3-small", vec![1.0, 2.0]);
        let hit = cache.get("hash1", "openai", "text-embedding-3-small");
        assert_eq!(hit, Some(vec![1.0, 2.0]));
    }

    #[test]
    fn different_model_is_a_miss() {
        let cache = EmbeddingCache::new(10);
        cache.put("hash1", "openai", "text-embedding-3-small", vec![1.0]);
        assert!(cache.get("hash1", "openai", "text-embedding-3-large").is_none());
    }

    #[test]
    fn evicts_oldest_when_full() {
        let cache = EmbeddingCache::new(2);
        cache.put("a", "p", "m", vec![1.0]);
        cache.put("b", "p", "m", vec![2.0]);
        cache.put("c", "p", "m", vec![3.0]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a", "p", "m").is_none());
        assert!(cache.get("c", "p", "m").is_some());
    }

    #[test]
    fn zero_capacity_never_caches() {
        let cache = EmbeddingCache::new(0);
        cache.put("a", "p", "m", vec![1.0]);
        assert!(cache.is_empty());
    }
}
