//! Context-aware chunker for prose: a sliding window measured in tokens,
//! with configurable overlap so a concept split across the window
//! boundary still appears whole in at least one chunk.

use crate::chunking::traits::TokenCounter;

/// One sliding-window span over the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    pub text: String,
    /// 1-indexed, inclusive.
    pub start_line: u32,
    /// 1-indexed, inclusive.
    pub end_line: u32,
}

/// Splits documentation text into overlapping, token-budgeted spans.
pub struct DocumentChunker<'a> {
    token_counter: &'a dyn TokenCounter,
}

impl<'a> DocumentChunker<'a> {
    #[must_use]
    pub fn new(token_counter: &'a dyn TokenCounter) -> Self {
        Self { token_counter }
    }

    /// `max_chunk_tokens` bounds each span; `overlap_tokens` is how many
    /// trailing tokens of a span are repeated at the start of the next one.
    /// A single line longer than `max_chunk_tokens` is still emitted whole
    /// rather than split mid-line.
    #[must_use]
    pub fn chunk(&self, text: &str, max_chunk_tokens: usize, overlap_tokens: usize) -> Vec<ChunkSpan> {
        let lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }
        let line_tokens = self.token_counter.count_batch(&lines);

        let mut spans = Vec::new();
        let mut start = 0_usize;

        while start < lines.len() {
            let mut end = start;
            let mut total = 0_usize;
            while end < lines.len() {
                let next_total = total.saturating_add(line_tokens[end]);
                if next_total > max_chunk_tokens && end > start {
                    break;
                }
                total = next_total;
                end = end.saturating_add(1);
            }

            spans.push(ChunkSpan {
                text: lines[start..end].join("\n"),
                start_line: u32::try_from(start.saturating_add(1)).unwrap_or(u32::MAX),
                end_line: u32::try_from(end).unwrap_or(u32::MAX),
            });

            if end >= lines.len() {
                break;
            }

            let mut back = end;
            let mut overlap_total = 0_usize;
            while back > start && overlap_total < overlap_tokens {
                back -= 1;
                overlap_total = overlap_total.saturating_add(line_tokens[back]);
            }
            start = if back > start { back } else { end };
        }

        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn name(&self) -> &str {
            "word-counter"
        }

        fn max_tokens(&self) -> usize {
            1000
        }

        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }

        fn count_batch(&self, texts: &[&str]) -> Vec<usize> {
            texts.iter().map(|t| self.count(t)).collect()
        }
    }

    #[test]
    fn single_short_line_is_one_chunk() {
        let counter = WordCounter;
        let chunker = DocumentChunker::new(&counter);
        let spans = chunker.chunk("hello world", 100, 0);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start_line, 1);
        assert_eq!(spans[0].end_line, 1);
    }

    #[test]
    fn long_text_splits_with_overlap() {
        let counter = WordCounter;
        let chunker = DocumentChunker::new(&counter);
        let text = (1..=20).map(|n| format!("line{n} has four words")).collect::<Vec<_>>().join("\n");
        let spans = chunker.chunk(&text, 12, 4);
        assert!(spans.len() > 1);
        // consecutive spans overlap: the next span starts at or before the previous one's end
        for pair in spans.windows(2) {
            assert!(pair[1].start_line <= pair[0].end_line);
        }
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        let counter = WordCounter;
        let chunker = DocumentChunker::new(&counter);
        assert!(chunker.chunk("", 100, 10).is_empty());
    }

    #[test]
    fn oversized_single_line_is_kept_whole() {
        let counter = WordCounter;
        let chunker = DocumentChunker::new(&counter);
        let long_line = "word ".repeat(50);
        let spans = chunker.chunk(long_line.trim(), 5, 0);
        assert_eq!(spans.len(), 1);
    }
}
