//! Offline indexing: load, chunk, embed, build, save.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use docqa_core::chunker::{Chunker, RecursiveChunker};
use docqa_core::loader::{DirectoryLoader, DocumentLoader, SkippedFile};
use docqa_core::traits::EmbeddingProvider;
use docqa_core::{Error, Result};
use docqa_vector::VectorIndex;

const EMBED_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub skipped: Vec<SkippedFile>,
    pub index_path: PathBuf,
}

/// Rebuild the index at `index_path` from every document under `source_dir`.
///
/// Unreadable files are skipped and listed in the report. The previous index,
/// if any, is replaced only once the new one is fully written.
pub async fn ingest(
    source_dir: &Path,
    index_path: &Path,
    chunk_size: usize,
    chunk_overlap: usize,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<IngestReport> {
    let chunker = RecursiveChunker::new(chunk_size, chunk_overlap)?;
    info!("Loading documents from {}", source_dir.display());
    let report = DirectoryLoader::new().load_dir(source_dir)?;
    let chunks = chunker.chunk(&report.documents);
    info!("{} documents -> {} chunks", report.documents.len(), chunks.len());
    if chunks.is_empty() {
        warn!("No text found under {}; writing an empty index", source_dir.display());
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embed_all(embedder.as_ref(), &texts)?;

    let index = VectorIndex::build(chunks, embeddings)?.with_embedder_id(embedder.id());
    index.save(index_path).await?;
    info!("Saved {} entries to {}", index.len(), index_path.display());

    Ok(IngestReport {
        documents: report.documents.len(),
        chunks: index.len(),
        skipped: report.skipped,
        index_path: index_path.to_path_buf(),
    })
}

fn embed_all(embedder: &dyn EmbeddingProvider, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let pb = ProgressBar::new(texts.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let mut embeddings = Vec::with_capacity(texts.len());
    for batch in texts.chunks(EMBED_BATCH_SIZE) {
        let vectors = embedder.embed_batch(batch)?;
        if vectors.len() != batch.len() {
            return Err(Error::Embedding(format!("{} returned {} vectors for {} texts", embedder.id(), vectors.len(), batch.len())));
        }
        if let Some(v) = vectors.iter().find(|v| v.len() != embedder.dim()) {
            return Err(Error::DimensionMismatch { expected: embedder.dim(), actual: v.len() });
        }
        embeddings.extend(vectors);
        pb.inc(batch.len() as u64);
    }
    pb.finish_with_message("embedded");
    Ok(embeddings)
}
