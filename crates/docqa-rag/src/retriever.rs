use std::sync::Arc;

use docqa_core::traits::EmbeddingProvider;
use docqa_core::{Chunk, Error, Result, ScoredChunk};
use docqa_vector::VectorIndex;

/// Embeds the query and searches the index.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<VectorIndex>) -> Self { Self { embedder, index } }

    /// Top `k` chunks for `query`, best first. An empty index yields nothing.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        Ok(self.retrieve_scored(query, k)?.into_iter().map(|s| s.chunk).collect())
    }

    pub fn retrieve_scored(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidArgument("query must not be empty".into()));
        }
        if k == 0 {
            return Err(Error::InvalidArgument("k must be positive".into()));
        }
        if self.index.is_empty() {
            return Ok(Vec::new());
        }
        let q_vec = self.embedder.embed(query)?;
        self.index.search(&q_vec, k)
    }

    pub fn index(&self) -> &VectorIndex { &self.index }
}
