//! Query-time orchestration.
//!
//! A `RagPipeline` only exists in the ready state: construction loads the
//! index and binds the model, so a missing index or missing credentials are
//! reported before the first question. After that everything it reads is
//! immutable and `answer` can run concurrently.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use docqa_core::config::Settings;
use docqa_core::traits::{EmbeddingProvider, LanguageModel};
use docqa_core::{Error, QueryResult, Result};
use docqa_vector::VectorIndex;

use crate::retriever::Retriever;
use crate::synthesizer::{AnswerSynthesizer, DEFAULT_TEMPERATURE};

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub top_k: usize,
    pub temperature: f32,
}

impl Default for PipelineOptions {
    fn default() -> Self { Self { top_k: 5, temperature: DEFAULT_TEMPERATURE } }
}

pub struct RagPipeline {
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    options: PipelineOptions,
}

impl RagPipeline {
    /// Load the index at `index_path` and wire it to `embedder` and `llm`.
    pub async fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index_path: &Path,
        llm: Arc<dyn LanguageModel>,
        options: PipelineOptions,
    ) -> Result<Self> {
        let index = load_index(index_path, embedder.as_ref()).await?;
        Ok(Self::from_parts(embedder, index, llm, options))
    }

    /// Build every component from configuration.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = docqa_embed::embedder_from_settings(&settings.embedding)?;
        let index = load_index(&settings.data.index_dir, embedder.as_ref()).await?;
        let llm = docqa_llm::build_language_model(&settings.llm)?;
        let options = PipelineOptions { top_k: settings.retrieval.top_k, temperature: settings.llm.temperature };
        Ok(Self::from_parts(embedder, index, llm, options))
    }

    fn from_parts(
        embedder: Arc<dyn EmbeddingProvider>,
        index: VectorIndex,
        llm: Arc<dyn LanguageModel>,
        options: PipelineOptions,
    ) -> Self {
        info!("Pipeline ready: {} chunks, embedder {}, model {}", index.len(), embedder.id(), llm.name());
        Self {
            retriever: Retriever::new(embedder, Arc::new(index)),
            synthesizer: AnswerSynthesizer::new(llm).with_temperature(options.temperature),
            options,
        }
    }

    pub async fn answer(&self, query: &str) -> Result<QueryResult> {
        let hits = self.retriever.retrieve_scored(query, self.options.top_k)?;
        for (i, hit) in hits.iter().enumerate() {
            debug!("#{} {:.4} {}", i + 1, hit.score, hit.chunk.provenance);
        }
        let sources: Vec<_> = hits.into_iter().map(|h| h.chunk).collect();
        let answer = self.synthesizer.synthesize(query, &sources).await?;
        Ok(QueryResult { answer, sources })
    }

    pub fn options(&self) -> PipelineOptions { self.options }

    pub fn index_len(&self) -> usize { self.retriever.index().len() }
}

async fn load_index(path: &Path, embedder: &dyn EmbeddingProvider) -> Result<VectorIndex> {
    let index = VectorIndex::load(path).await?;
    if let Some(dim) = index.dim() {
        if dim != embedder.dim() {
            return Err(Error::DimensionMismatch { expected: dim, actual: embedder.dim() });
        }
    }
    if let Some(id) = index.embedder_id() {
        if id != embedder.id() {
            warn!("Index at {} was built with {}, querying with {}", path.display(), id, embedder.id());
        }
    }
    Ok(index)
}

static SHARED: OnceCell<Arc<RagPipeline>> = OnceCell::const_new();

/// The process-wide pipeline, built from `settings` on first use.
///
/// Later calls return the same instance and ignore their `settings`. A failed
/// build is not cached.
pub async fn shared_pipeline(settings: &Settings) -> Result<Arc<RagPipeline>> {
    SHARED
        .get_or_try_init(|| async { RagPipeline::from_settings(settings).await.map(Arc::new) })
        .await
        .map(Arc::clone)
}
