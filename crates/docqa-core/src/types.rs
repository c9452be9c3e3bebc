//! Domain types flowing through ingest and query.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a piece of text came from.
///
/// `page` is 1-indexed; `None` means the page could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    pub source: PathBuf,
    pub page: Option<u32>,
}

impl Provenance {
    pub fn new(source: impl Into<PathBuf>, page: Option<u32>) -> Self {
        Self { source: source.into(), page }
    }

    /// File name of the source without its directory, for display.
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map_or_else(|| self.source.to_string_lossy().to_string(), |n| n.to_string_lossy().to_string())
    }

    pub fn page_label(&self) -> String {
        self.page.map_or_else(|| "unknown".to_string(), |p| p.to_string())
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Page {})", self.file_name(), self.page_label())
    }
}

/// One loaded unit of text, typically a single PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
    provenance: Provenance,
}

impl Document {
    pub fn new(text: impl Into<String>, provenance: Provenance) -> Self {
        Self { text: text.into(), provenance }
    }

    pub fn text(&self) -> &str { &self.text }

    pub fn provenance(&self) -> &Provenance { &self.provenance }

    pub fn source(&self) -> &Path { &self.provenance.source }
}

/// A bounded slice of a document that is embedded and retrieved on its own.
///
/// - `id`: `<file stem>:<page|unknown>:<chunk_index>`
/// - `provenance`: copied verbatim from the originating document
/// - `chunk_index`: position within the originating document, from 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub provenance: Provenance,
    pub chunk_index: usize,
}

impl Chunk {
    pub fn new(text: impl Into<String>, provenance: Provenance, chunk_index: usize) -> Self {
        let stem = provenance
            .source
            .file_stem()
            .map_or_else(|| "doc".to_string(), |s| s.to_string_lossy().to_string());
        let id = format!("{}:{}:{}", stem, provenance.page_label(), chunk_index);
        Self { id, text: text.into(), provenance, chunk_index }
    }
}

/// A search result. `score` is cosine similarity; higher is better.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// The outcome of one question: the synthesized answer and the chunks it was
/// grounded on, in retrieval order.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<Chunk>,
}
