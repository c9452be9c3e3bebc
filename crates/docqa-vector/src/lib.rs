//! docqa-vector
//!
//! Exact cosine-similarity index over chunk embeddings. The index lives in
//! memory and is read-only once built; `table` persists it as a LanceDB table
//! next to a JSON manifest so `load` can rebuild it without external state.

pub mod schema;
pub mod table;

use tracing::debug;

use docqa_core::error::{Error, Result};
use docqa_core::types::{Chunk, ScoredChunk};

pub use table::Manifest;

/// Similarity metric used by every index.
pub const METRIC: &str = "cosine";

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    norms: Vec<f32>,
    dim: Option<usize>,
    embedder_id: Option<String>,
}

impl VectorIndex {
    /// Build from parallel sequences of chunks and embeddings.
    ///
    /// Fails with `DimensionMismatch` when the embeddings do not all share the
    /// same dimension, and with `InvalidArgument` when the sequences differ in
    /// length or an embedding is empty or not finite.
    pub fn build(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(Error::InvalidArgument(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        let dim = embeddings.first().map(Vec::len);
        if let Some(expected) = dim {
            if expected == 0 {
                return Err(Error::InvalidArgument("embeddings must not be empty".into()));
            }
            for e in &embeddings {
                if e.len() != expected {
                    return Err(Error::DimensionMismatch { expected, actual: e.len() });
                }
                if e.iter().any(|x| !x.is_finite()) {
                    return Err(Error::InvalidArgument("embedding contains a non-finite value".into()));
                }
            }
        }
        let norms = embeddings.iter().map(|e| l2_norm(e)).collect();
        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();
        Ok(Self { entries, norms, dim, embedder_id: None })
    }

    /// Record which embedding model produced the vectors.
    pub fn with_embedder_id(mut self, id: impl Into<String>) -> Self {
        self.embedder_id = Some(id.into());
        self
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Embedding dimension, `None` for an empty index.
    pub fn dim(&self) -> Option<usize> { self.dim }

    pub fn embedder_id(&self) -> Option<&str> { self.embedder_id.as_deref() }

    pub fn entries(&self) -> &[IndexEntry] { &self.entries }

    /// The `k` entries most similar to `query` by cosine similarity, best first.
    ///
    /// Exact scan; equal scores keep insertion order. An index with fewer than
    /// `k` entries returns all of them, an empty index returns nothing.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be positive".into()));
        }
        let Some(dim) = self.dim else { return Ok(Vec::new()) };
        if query.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: query.len() });
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidArgument("query embedding contains a non-finite value".into()));
        }
        let query_norm = l2_norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(i, (entry, norm))| (i, cosine(query, query_norm, &entry.embedding, *norm)))
            .collect();
        // stable: ties stay in insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        debug!("search k={} -> {} hits", k, scored.len());
        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk { chunk: self.entries[i].chunk.clone(), score })
            .collect())
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}
