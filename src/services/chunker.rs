//! Recursive boundary splitting with overlap.
//!
//! Text is split on a prioritized separator ladder (paragraph break, line
//! break, space), falling back to a character-level hard cut for indivisible
//! runs. Separators stay attached to the preceding piece, so every input
//! character lands in at least one chunk and chunk order follows document
//! order.

use crate::models::ChunkingConfig;

/// Separator ladder, coarsest to finest. Character hard cut is the implicit
/// final level.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Splits long text into overlapping, bounded-size segments.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    /// Maximum chunk size in characters.
    chunk_size: usize,
    /// Characters duplicated from the tail of one chunk into the head of the
    /// next, when they fit.
    overlap: usize,
}

impl RecursiveSplitter {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: (config.chunk_size as usize).max(1),
            overlap: config.chunk_overlap as usize,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&ChunkingConfig::default())
    }

    /// Split `text` into ordered chunks of at most `chunk_size` characters.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let pieces = self.split_recursive(text, &SEPARATORS);
        self.merge(&pieces)
    }

    /// Break text into pieces no longer than `chunk_size`, trying each
    /// separator in turn and re-splitting oversized pieces with the finer
    /// levels.
    fn split_recursive<'a>(&self, text: &'a str, separators: &[&str]) -> Vec<&'a str> {
        if char_len(text) <= self.chunk_size {
            return vec![text];
        }

        let Some((sep, rest)) = separators.split_first() else {
            return self.hard_cut(text);
        };

        if !text.contains(sep) {
            return self.split_recursive(text, rest);
        }

        let mut pieces = Vec::new();
        for part in text.split_inclusive(sep) {
            if char_len(part) <= self.chunk_size {
                pieces.push(part);
            } else {
                pieces.extend(self.split_recursive(part, rest));
            }
        }
        pieces
    }

    /// Character-level cut for runs with no usable separator.
    fn hard_cut<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut pieces = Vec::new();
        let mut start = 0;
        let mut count = 0;
        for (idx, _) in text.char_indices() {
            if count == self.chunk_size {
                pieces.push(&text[start..idx]);
                start = idx;
                count = 0;
            }
            count += 1;
        }
        pieces.push(&text[start..]);
        pieces
    }

    /// Merge adjacent pieces into the largest windows not exceeding
    /// `chunk_size`. Each new window is seeded with the trailing `overlap`
    /// characters of the previous one when seed plus next piece still fit.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for piece in pieces {
            let piece_len = char_len(piece);

            if current_len > 0 && current_len + piece_len > self.chunk_size {
                let closed = std::mem::take(&mut current);
                let tail = char_tail(&closed, self.overlap);
                let tail_len = char_len(tail);
                if tail_len > 0 && tail_len + piece_len <= self.chunk_size {
                    current.push_str(tail);
                    current_len = tail_len;
                } else {
                    current_len = 0;
                }
                chunks.push(closed);
            }

            current.push_str(piece);
            current_len += piece_len;
        }

        if current_len > 0 {
            chunks.push(current);
        }
        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s` as a subslice.
fn char_tail(s: &str, n: usize) -> &str {
    let len = char_len(s);
    if len <= n {
        return s;
    }
    match s.char_indices().nth(len - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
