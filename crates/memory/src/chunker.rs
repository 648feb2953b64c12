//! Paragraph-based text chunking.
//!
//! Splits input text on blank-line paragraph boundaries. Each chunk carries
//! the 1-indexed start/end line numbers of the source text it was split
//! from. A paragraph larger than the soft max is force-flushed mid-paragraph,
//! so a single runaway paragraph never produces one unbounded chunk. When a
//! paragraph is force-flushed, the tail of the flushed chunk is carried into
//! the next one as overlap so search context isn't severed at the boundary.

/// A single chunk produced by [`chunk_text`], before it is wrapped into a
/// stored [`wd_domain::memory::MemoryChunk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// Split `text` into paragraph-bounded chunks no larger than
/// `soft_max_chars`, carrying up to `overlap_chars` from the tail of a
/// force-flushed chunk into the one that follows it.
pub fn chunk_text(text: &str, soft_max_chars: usize, overlap_chars: usize) -> Vec<RawChunk> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let mut chunks: Vec<RawChunk> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_start = 1usize;
    let mut current_len = 0usize;

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;

        if line.trim().is_empty() {
            if current.is_empty() {
                current_start = line_no + 1;
            } else {
                flush(&mut chunks, &mut current, current_start, line_no - 1);
                current_len = 0;
                current_start = line_no + 1;
            }
            continue;
        }

        current.push((*line).to_string());
        current_len += line.len() + 1;

        if current_len >= soft_max_chars {
            flush(&mut chunks, &mut current, current_start, line_no);
            current_len = 0;
            current_start = line_no + 1;

            if overlap_chars > 0 {
                if let Some(last) = chunks.last() {
                    let tail = tail_chars(&last.text, overlap_chars);
                    if !tail.is_empty() {
                        current_len = tail.len();
                        current.push(tail);
                    }
                }
            }
        }
    }
    flush(&mut chunks, &mut current, current_start, lines.len());

    chunks
}

fn flush(chunks: &mut Vec<RawChunk>, current: &mut Vec<String>, start_line: usize, end_line: usize) {
    if current.is_empty() {
        return;
    }
    chunks.push(RawChunk {
        text: current.join("\n"),
        start_line,
        end_line,
    });
    current.clear();
}

/// Returns up to `n` trailing characters of `s`, snapped to a char boundary.
fn tail_chars(s: &str, n: usize) -> String {
    if s.len() <= n {
        return s.to_string();
    }
    let start = s.len() - n;
    let mut boundary = start;
    while boundary < s.len() && !s.is_char_boundary(boundary) {
        boundary += 1;
    }
    s[boundary..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_blank_line() {
        let text = "para one line a\npara one line b\n\npara two";
        let chunks = chunk_text(text, 1_000, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "para one line a\npara one line b");
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
        assert_eq!(chunks[1].text, "para two");
        assert_eq!(chunks[1].start_line, 4);
    }

    #[test]
    fn single_paragraph_no_split() {
        let text = "just one paragraph\nof two lines";
        let chunks = chunk_text(text, 1_000, 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
    }

    #[test]
    fn force_flush_large_paragraph() {
        let line = "x".repeat(50);
        let text = (0..10).map(|_| line.clone()).collect::<Vec<_>>().join("\n");
        let chunks = chunk_text(&text, 120, 0);
        assert!(
            chunks.len() > 1,
            "a 500-char paragraph with a 120-char soft max must split"
        );
        for c in &chunks {
            assert!(c.start_line <= c.end_line);
        }
    }

    #[test]
    fn force_flush_carries_overlap() {
        let line = "x".repeat(50);
        let text = (0..10).map(|_| line.clone()).collect::<Vec<_>>().join("\n");
        let chunks = chunk_text(&text, 120, 20);
        assert!(chunks.len() > 1);
        // Second chunk should start with the tail of the first.
        let first_tail = tail_chars(&chunks[0].text, 20);
        assert!(chunks[1].text.starts_with(&first_tail));
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 1_000, 0).is_empty());
    }

    #[test]
    fn multiple_blank_lines_collapse() {
        let text = "a\n\n\n\nb";
        let chunks = chunk_text(text, 1_000, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "b");
    }
}
