//! Assembles hybrid search hits into a bounded-size markdown block for
//! injection into the agent's system prompt.

use crate::search::SearchHit;

/// Builds a `MEMORY` context section from search hits, respecting a hard
/// character budget. Truncates rather than overflowing the prompt.
pub struct MemoryContextBuilder {
    max_chars: usize,
}

impl MemoryContextBuilder {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Render `hits` as a titled markdown block, one bullet per hit,
    /// annotated `[personal]` when the hit was boosted for the querying
    /// user. Returns an empty string when `hits` is empty.
    pub fn build(&self, hits: &[SearchHit]) -> String {
        if hits.is_empty() {
            return String::new();
        }

        let mut output = String::from("### Memory\n");
        for hit in hits {
            let tag = if hit.personal { " [personal]" } else { "" };
            let line = format!(
                "- ({}:{}-{}{tag}) {}\n",
                hit.chunk.path,
                hit.chunk.start_line,
                hit.chunk.end_line,
                hit.chunk.text.trim()
            );

            if output.len() + line.len() > self.max_chars {
                let remaining = self.max_chars.saturating_sub(output.len());
                if remaining > 20 {
                    let cut = line
                        .char_indices()
                        .take_while(|(i, _)| *i < remaining.saturating_sub(16))
                        .last()
                        .map(|(i, c)| i + c.len_utf8())
                        .unwrap_or(0);
                    output.push_str(&line[..cut]);
                }
                output.push_str("\n[MEMORY_TRUNCATED]\n");
                return output;
            }

            output.push_str(&line);
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wd_domain::memory::{MemoryChunk, MemoryScope};

    fn hit(text: &str, personal: bool) -> SearchHit {
        SearchHit {
            chunk: MemoryChunk {
                id: uuid::Uuid::new_v4(),
                path: "notes.md".into(),
                source: "workspace".into(),
                scope: if personal { MemoryScope::Personal } else { MemoryScope::Global },
                user_id: None,
                text: text.into(),
                start_line: 1,
                end_line: 2,
                embedding: None,
                content_hash: "h".into(),
                created_at: Utc::now(),
            },
            score: 0.9,
            personal,
        }
    }

    #[test]
    fn empty_hits_yields_empty_string() {
        let builder = MemoryContextBuilder::new(1_000);
        assert_eq!(builder.build(&[]), "");
    }

    #[test]
    fn renders_personal_tag() {
        let builder = MemoryContextBuilder::new(1_000);
        let out = builder.build(&[hit("alice likes dark mode", true)]);
        assert!(out.contains("[personal]"));
        assert!(out.contains("alice likes dark mode"));
    }

    #[test]
    fn truncates_when_over_budget() {
        let builder = MemoryContextBuilder::new(40);
        let hits = vec![hit("a long line of memory text that exceeds budget", false), hit("second", false)];
        let out = builder.build(&hits);
        assert!(out.contains("[MEMORY_TRUNCATED]"));
    }
}
