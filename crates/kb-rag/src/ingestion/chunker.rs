//! Text chunking with overlap, boundary-aware cuts, and page tracking

use serde::{Deserialize, Serialize};

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};

/// Separator priority for boundary cuts: paragraph break, line break,
/// sentence-ending punctuation, whitespace. A hard character cut is the
/// final fallback when no separator fits.
pub const DEFAULT_SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "? ", "! ", " "];

/// Estimate the token count of a text
///
/// Uses the chars/4 heuristic as a fast proxy. This is an approximation,
/// not an exact tokenizer count; budget checks built on it are approximate
/// near their boundaries.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as u32).div_ceil(4)
}

/// Text of a single page of a paginated source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Page text
    pub text: String,
}

/// A chunk of text produced by the splitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSplit {
    /// Trimmed chunk content
    pub content: String,
    /// Ordinal index (0-based, gapless across the whole document)
    pub index: u32,
    /// Estimated token count of the trimmed content
    pub token_count: u32,
    /// Start offset of the pre-trim span in the source text
    pub char_start: usize,
    /// End offset of the pre-trim span in the source text
    pub char_end: usize,
    /// Page number for paginated sources
    pub page: Option<u32>,
}

/// Splits text into overlapping segments honoring semantic boundaries
///
/// Each window is cut at the highest-priority separator that still leaves a
/// usable segment; the next window starts `chunk_size - overlap` characters
/// later, so consecutive chunks share an overlap-sized tail.
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
    separators: Vec<String>,
}

impl TextChunker {
    /// Create a chunker with the default separator priority
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Create a chunker from configuration
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Override the separator priority list
    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    /// Split text into ordered chunks
    ///
    /// Fails with `EmptyInput` on blank text.
    pub fn split(&self, text: &str) -> Result<Vec<TextSplit>> {
        if text.trim().is_empty() {
            return Err(Error::EmptyInput);
        }

        let mut splits = Vec::new();
        self.split_into(text, 0, None, &mut splits);
        Ok(splits)
    }

    /// Split paginated text, renumbering ordinals globally across pages
    ///
    /// Each page runs through the same splitter; chunk offsets refer to the
    /// concatenated page stream and each chunk records its page number, so
    /// multi-page sources keep page attribution for citation.
    pub fn split_pages(&self, pages: &[PageText]) -> Result<Vec<TextSplit>> {
        let mut splits = Vec::new();
        let mut base_offset = 0;

        for page in pages {
            if !page.text.trim().is_empty() {
                self.split_into(&page.text, base_offset, Some(page.page_number), &mut splits);
            }
            base_offset += page.text.len();
        }

        if splits.is_empty() {
            return Err(Error::EmptyInput);
        }
        Ok(splits)
    }

    /// Split one text span, appending to `splits` with continued ordinals
    fn split_into(
        &self,
        text: &str,
        base_offset: usize,
        page: Option<u32>,
        splits: &mut Vec<TextSplit>,
    ) {
        for (start, end) in self.spans(text) {
            let trimmed = text[start..end].trim();
            if trimmed.is_empty() {
                continue;
            }
            let index = splits.len() as u32;
            splits.push(TextSplit {
                content: trimmed.to_string(),
                index,
                token_count: estimate_tokens(trimmed),
                char_start: base_offset + start,
                char_end: base_offset + end,
                page,
            });
        }
    }

    /// Compute the pre-trim byte spans of all chunks
    fn spans(&self, text: &str) -> Vec<(usize, usize)> {
        let len = text.len();
        let mut spans = Vec::new();
        let mut start = 0;

        while start < len {
            let mut end = (start + self.chunk_size).min(len);
            while end < len && !text.is_char_boundary(end) {
                end += 1;
            }

            if end < len {
                if let Some(cut) = self.boundary_cut(&text[start..end]) {
                    end = start + cut;
                }
            }

            spans.push((start, end));
            if end == len {
                break;
            }

            // Overlap is modeled by advancing the next start position, not
            // by re-scanning the tail of the previous chunk.
            let advance = (end - start).saturating_sub(self.overlap);
            start = if advance == 0 { end } else { start + advance };
            while start < len && !text.is_char_boundary(start) {
                start += 1;
            }
        }

        spans
    }

    /// Find the latest separator-aligned cut in the window, by priority
    ///
    /// A cut is usable only if it leaves the segment longer than the
    /// overlap; a shorter one would stall the next start position.
    fn boundary_cut(&self, window: &str) -> Option<usize> {
        for sep in &self.separators {
            if let Some(pos) = window.rfind(sep.as_str()) {
                let cut = pos + sep.len();
                if cut > self.overlap {
                    return Some(cut);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let chunker = TextChunker::new(1000, 200);
        assert!(matches!(chunker.split("").unwrap_err(), Error::EmptyInput));
        assert!(matches!(
            chunker.split("  \n\t ").unwrap_err(),
            Error::EmptyInput
        ));
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = TextChunker::new(1000, 200);
        let splits = chunker.split("A short note.").unwrap();

        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].index, 0);
        assert_eq!(splits[0].content, "A short note.");
        assert_eq!(splits[0].char_start, 0);
        assert_eq!(splits[0].char_end, 13);
    }

    #[test]
    fn test_2400_chars_yield_three_chunks() {
        // 480 x "word " = 2400 characters
        let text = "word ".repeat(480);
        let chunker = TextChunker::new(1000, 200);
        let splits = chunker.split(&text).unwrap();

        assert_eq!(splits.len(), 3);
        let indices: Vec<u32> = splits.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        // Consecutive spans overlap by ~200 characters at each boundary
        for pair in splits.windows(2) {
            let overlap = pair[0].char_end.saturating_sub(pair[1].char_start);
            assert!(
                (150..=200).contains(&overlap),
                "expected ~200 char overlap, got {}",
                overlap
            );
        }
        assert_eq!(splits[2].char_end, 2400);
    }

    #[test]
    fn test_coverage_no_gaps_beyond_overlap() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(120);
        let chunker = TextChunker::new(800, 150);
        let splits = chunker.split(&text).unwrap();

        assert_eq!(splits[0].char_start, 0);
        assert_eq!(splits.last().unwrap().char_end, text.len());
        for pair in splits.windows(2) {
            // Next span starts inside (or at the end of) the previous one
            assert!(pair[1].char_start <= pair[0].char_end);
            assert!(pair[0].char_end - pair[1].char_start <= 150);
        }
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let para1 = "a".repeat(700);
        let para2 = "b".repeat(600);
        let text = format!("{}\n\n{}", para1, para2);

        let chunker = TextChunker::new(1000, 200);
        let splits = chunker.split(&text).unwrap();

        // First cut lands on the paragraph break, not mid-paragraph
        assert_eq!(splits[0].content, para1);
    }

    #[test]
    fn test_hard_cut_without_separators() {
        let text = "x".repeat(2500);
        let chunker = TextChunker::new(1000, 200);
        let splits = chunker.split(&text).unwrap();

        assert!(splits.len() >= 3);
        assert_eq!(splits[0].char_end - splits[0].char_start, 1000);
    }

    #[test]
    fn test_multibyte_boundary_safety() {
        let text = "é".repeat(1500);
        let chunker = TextChunker::new(1000, 200);
        let splits = chunker.split(&text).unwrap();

        for split in &splits {
            assert!(!split.content.is_empty());
        }
    }

    #[test]
    fn test_page_aware_global_ordinals() {
        let pages = vec![
            PageText {
                page_number: 1,
                text: "first page sentence. ".repeat(80),
            },
            PageText {
                page_number: 2,
                text: "second page sentence. ".repeat(80),
            },
        ];

        let chunker = TextChunker::new(500, 100);
        let splits = chunker.split_pages(&pages).unwrap();

        let indices: Vec<u32> = splits.iter().map(|s| s.index).collect();
        let expected: Vec<u32> = (0..splits.len() as u32).collect();
        assert_eq!(indices, expected);

        assert!(splits.iter().any(|s| s.page == Some(1)));
        assert!(splits.iter().any(|s| s.page == Some(2)));

        // Offsets continue across the concatenated page stream
        let page1_len = pages[0].text.len();
        let first_page2 = splits.iter().find(|s| s.page == Some(2)).unwrap();
        assert!(first_page2.char_start >= page1_len);
    }

    #[test]
    fn test_blank_pages_are_skipped() {
        let pages = vec![
            PageText {
                page_number: 1,
                text: "   ".to_string(),
            },
            PageText {
                page_number: 2,
                text: "content".to_string(),
            },
        ];

        let chunker = TextChunker::new(500, 100);
        let splits = chunker.split_pages(&pages).unwrap();

        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].page, Some(2));
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(1000)), 250);
    }
}
