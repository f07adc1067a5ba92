//! Document chunking.
//!
//! Descriptions are split into overlapping windows before embedding. Sizes are
//! counted in characters, not bytes, so multi-byte text never splits inside a
//! code point.

/// A strategy for splitting text into chunks.
pub trait Chunker: Send + Sync {
    /// Split `text` into an ordered sequence of chunks.
    ///
    /// Returns an empty `Vec` for empty text.
    fn split(&self, text: &str) -> Vec<String>;
}

/// Boundary classes tried from the strongest break to the weakest.
const SEPARATORS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" ", "\t"]];

/// Splits text into windows of at most `chunk_size` characters that overlap by
/// exactly `chunk_overlap` characters.
///
/// Each window ends at the latest paragraph break, line break, sentence end or
/// whitespace found in the back half of the window, in that order of
/// preference, and falls back to a hard cut when none is present. Separators
/// stay attached to the preceding chunk. The next window starts
/// `chunk_overlap` characters before the previous end, so dropping the first
/// `chunk_overlap` characters of every chunk after the first and concatenating
/// yields the original text.
///
/// # Example
///
/// ```rust,ignore
/// use observo_match::{Chunker, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(1200, 150);
/// let chunks = chunker.split(&opportunity.describe());
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// `chunk_overlap` is capped below `chunk_size`; use
    /// [`MatchConfig::builder`](crate::MatchConfig::builder) to have an
    /// inconsistent pair rejected instead.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self { chunk_size, chunk_overlap: chunk_overlap.min(chunk_size - 1) }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Pick the end (exclusive, in chars) of the window starting at `start`.
    fn window_end(&self, chars: &[char], start: usize) -> usize {
        let hard_end = start + self.chunk_size;
        // Stay past the overlap so the next window always advances, and keep
        // chunks from collapsing to a sliver when the only break is early.
        let floor = start + (self.chunk_overlap + 1).max(self.chunk_size / 2);
        if floor >= hard_end {
            return hard_end;
        }

        for class in SEPARATORS {
            let found = (floor..=hard_end).rev().find(|&end| {
                class.iter().any(|sep| ends_with(&chars[start..end], sep))
            });
            if let Some(end) = found {
                return end;
            }
        }
        hard_end
    }
}

fn ends_with(window: &[char], separator: &str) -> bool {
    let len = separator.chars().count();
    window.len() >= len && window[window.len() - len..].iter().copied().eq(separator.chars())
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }
        if chars.len() <= self.chunk_size {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            if start + self.chunk_size >= chars.len() {
                chunks.push(chars[start..].iter().collect());
                break;
            }
            let end = self.window_end(&chars, start);
            chunks.push(chars[start..end].iter().collect());
            start = end - self.chunk_overlap;
        }
        chunks
    }
}
