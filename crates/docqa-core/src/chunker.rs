//! Overlapping, boundary-aware text chunking.
//!
//! Each chunk is at most `chunk_size` chars. A cut prefers the last paragraph
//! break in the window, then the last line break, then the last space, and
//! only then falls back to a hard cut. The next chunk restarts exactly
//! `chunk_overlap` chars before the previous cut, so neighbouring chunks share
//! that much text.

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Separators in decreasing granularity.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

pub trait Chunker: Send + Sync {
    fn chunk(&self, documents: &[Document]) -> Vec<Chunk>;
}

#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<Vec<char>>,
}

impl RecursiveChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidArgument("chunk_size must be positive".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::InvalidArgument(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        let separators = SEPARATORS.iter().map(|s| s.chars().collect()).collect();
        Ok(Self { chunk_size, chunk_overlap, separators })
    }

    pub fn chunk_size(&self) -> usize { self.chunk_size }

    pub fn chunk_overlap(&self) -> usize { self.chunk_overlap }

    /// Split raw text. Blank input yields no pieces.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = text.chars().collect();
        let mut pieces = Vec::new();
        let mut start = 0usize;
        loop {
            if chars.len() - start <= self.chunk_size {
                pieces.push(chars[start..].iter().collect());
                break;
            }
            let end = self.find_cut(&chars, start);
            pieces.push(chars[start..end].iter().collect());
            start = end - self.chunk_overlap;
        }
        pieces
    }

    /// End (exclusive) of the chunk starting at `start`. Always greater than
    /// `start + chunk_overlap` so the walk makes progress.
    ///
    /// Separators ending in the first half of the window are only used when
    /// nothing later qualifies; otherwise an early paragraph break would yield
    /// a short chunk that the next one almost entirely repeats.
    fn find_cut(&self, chars: &[char], start: usize) -> usize {
        let limit = start + self.chunk_size;
        let min_end = start + self.chunk_overlap + 1;
        let preferred_end = min_end.max(start + self.chunk_size / 2);
        self.last_separator_end(chars, start, preferred_end)
            .or_else(|| self.last_separator_end(chars, start, min_end))
            .unwrap_or(limit)
    }

    /// End of the last occurrence of the highest-priority separator that lies
    /// in the window and ends at or after `min_end`.
    fn last_separator_end(&self, chars: &[char], start: usize, min_end: usize) -> Option<usize> {
        let limit = start + self.chunk_size;
        for sep in &self.separators {
            let len = sep.len();
            if len > self.chunk_size {
                continue;
            }
            let mut pos = limit - len;
            while pos >= start && pos + len >= min_end {
                if chars[pos..pos + len] == sep[..] {
                    return Some(pos + len);
                }
                if pos == 0 {
                    break;
                }
                pos -= 1;
            }
        }
        None
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in documents {
            let pieces = self.split_text(doc.text());
            debug!("{} -> {} chunks", doc.provenance(), pieces.len());
            chunks.extend(
                pieces
                    .into_iter()
                    .enumerate()
                    .map(|(i, text)| Chunk::new(text, doc.provenance().clone(), i)),
            );
        }
        chunks
    }
}
