//! In-process lexical (keyword) index over chunk text.
//!
//! Scores candidates with BM25, a standard ranking function, and normalizes
//! the raw score into `[0, 1]` via `1 / (1 + |rank|)` for use in the hybrid
//! merge (spec'd normalization; BM25 scores are otherwise unbounded).

use std::collections::HashMap;

use uuid::Uuid;

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

#[derive(Debug, Default)]
struct DocEntry {
    term_counts: HashMap<String, u32>,
    length: usize,
}

/// A simple BM25 lexical index keyed by chunk id.
#[derive(Debug, Default)]
pub struct LexicalIndex {
    docs: HashMap<Uuid, DocEntry>,
    term_doc_freq: HashMap<String, u32>,
    total_length: u64,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, id: Uuid, text: &str) {
        self.remove(id);

        let tokens = tokenize(text);
        let mut term_counts: HashMap<String, u32> = HashMap::new();
        for tok in &tokens {
            *term_counts.entry(tok.clone()).or_insert(0) += 1;
        }
        for term in term_counts.keys() {
            *self.term_doc_freq.entry(term.clone()).or_insert(0) += 1;
        }
        self.total_length += tokens.len() as u64;
        self.docs.insert(
            id,
            DocEntry {
                term_counts,
                length: tokens.len(),
            },
        );
    }

    pub fn remove(&mut self, id: Uuid) {
        if let Some(entry) = self.docs.remove(&id) {
            self.total_length = self.total_length.saturating_sub(entry.length as u64);
            for term in entry.term_counts.keys() {
                if let Some(df) = self.term_doc_freq.get_mut(term) {
                    *df = df.saturating_sub(1);
                    if *df == 0 {
                        self.term_doc_freq.remove(term);
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn avg_doc_length(&self) -> f64 {
        if self.docs.is_empty() {
            0.0
        } else {
            self.total_length as f64 / self.docs.len() as f64
        }
    }

    /// Score `query` against every indexed document with BM25, returning
    /// `(id, normalized_score)` pairs sorted descending, capped at `k`.
    pub fn search(&self, query: &str, k: usize) -> Vec<(Uuid, f64)> {
        let terms = tokenize(query);
        if terms.is_empty() || self.docs.is_empty() {
            return Vec::new();
        }

        let n = self.docs.len() as f64;
        let avg_len = self.avg_doc_length();

        let idf: HashMap<&str, f64> = terms
            .iter()
            .map(|t| {
                let df = *self.term_doc_freq.get(t).unwrap_or(&0) as f64;
                let score = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                (t.as_str(), score)
            })
            .collect();

        let mut scores: Vec<(Uuid, f64)> = self
            .docs
            .iter()
            .filter_map(|(id, doc)| {
                let mut score = 0.0f64;
                for term in &terms {
                    let Some(&tf) = doc.term_counts.get(term) else {
                        continue;
                    };
                    let tf = tf as f64;
                    let term_idf = idf.get(term.as_str()).copied().unwrap_or(0.0);
                    let denom =
                        tf + BM25_K1 * (1.0 - BM25_B + BM25_B * (doc.length as f64 / avg_len.max(1.0)));
                    score += term_idf * (tf * (BM25_K1 + 1.0)) / denom.max(f64::EPSILON);
                }
                if score > 0.0 {
                    Some((*id, normalize_rank(score)))
                } else {
                    None
                }
            })
            .collect();

        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scores.truncate(k);
        scores
    }
}

/// Normalize an unbounded ranking score into `[0, 1)`.
pub fn normalize_rank(rank: f64) -> f64 {
    1.0 / (1.0 + rank.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_and_search_finds_matching_doc() {
        let mut idx = LexicalIndex::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        idx.upsert(a, "the quick brown fox jumps over the lazy dog");
        idx.upsert(b, "rust programming language memory safety");

        let hits = idx.search("rust memory", 10);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].0, b);
    }

    #[test]
    fn remove_drops_document() {
        let mut idx = LexicalIndex::new();
        let a = Uuid::new_v4();
        idx.upsert(a, "hello world");
        assert_eq!(idx.len(), 1);
        idx.remove(a);
        assert_eq!(idx.len(), 0);
        assert!(idx.search("hello", 10).is_empty());
    }

    #[test]
    fn empty_query_returns_no_hits() {
        let mut idx = LexicalIndex::new();
        idx.upsert(Uuid::new_v4(), "some text");
        assert!(idx.search("", 10).is_empty());
    }

    #[test]
    fn normalized_scores_are_bounded() {
        let mut idx = LexicalIndex::new();
        for i in 0..20 {
            idx.upsert(Uuid::new_v4(), &format!("document number {i} about rust and memory"));
        }
        let hits = idx.search("rust memory document", 20);
        for (_, score) in hits {
            assert!(score > 0.0 && score <= 1.0);
        }
    }

    #[test]
    fn respects_k_cap() {
        let mut idx = LexicalIndex::new();
        for i in 0..10 {
            idx.upsert(Uuid::new_v4(), &format!("rust doc {i}"));
        }
        let hits = idx.search("rust", 3);
        assert_eq!(hits.len(), 3);
    }
}
