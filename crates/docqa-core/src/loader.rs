//! Directory loader: one `Document` per page of every recognised file.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{Document, Provenance};

/// A file, or a single PDF page, that was skipped during loading.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    /// Set when only this page of the file was skipped.
    pub page: Option<u32>,
    pub reason: String,
}

/// Documents produced by a load, plus the files that could not be read.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

pub trait DocumentLoader: Send + Sync {
    fn load_dir(&self, dir: &Path) -> Result<LoadReport>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Pdf,
    Text,
}

impl FileKind {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|s| s.to_str())?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "md" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Loads PDF (per page) and plain-text files from a single directory level.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryLoader;

impl DirectoryLoader {
    pub fn new() -> Self { Self }

    /// Recognised files directly under `dir`, in path order.
    pub fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(Error::Load(format!("{} is not a readable directory", dir.display())));
        }
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_file() && FileKind::from_path(entry.path()).is_some() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Load one file. Blank pages are dropped; PDF pages that fail to
    /// extract are listed in `skipped` while the rest of the file is kept.
    pub fn load_file(&self, path: &Path) -> Result<LoadReport> {
        let mut report = match FileKind::from_path(path) {
            Some(FileKind::Pdf) => load_pdf(path)?,
            Some(FileKind::Text) => LoadReport { documents: load_text(path)?, skipped: Vec::new() },
            None => return Err(Error::Load(format!("unsupported file type: {}", path.display()))),
        };
        report.documents.retain(|d| !d.text().trim().is_empty());
        Ok(report)
    }
}

impl DocumentLoader for DirectoryLoader {
    fn load_dir(&self, dir: &Path) -> Result<LoadReport> {
        let files = self.list_files(dir)?;
        if files.is_empty() {
            warn!("No supported documents found under {}", dir.display());
        }
        let mut report = LoadReport::default();
        for (i, path) in files.iter().enumerate() {
            info!("Loading file {}/{}: {}", i + 1, files.len(), path.display());
            match self.load_file(path) {
                Ok(file) => {
                    debug!("{} -> {} pages with text", path.display(), file.documents.len());
                    report.documents.extend(file.documents);
                    report.skipped.extend(file.skipped);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.skipped.push(SkippedFile { path: path.clone(), page: None, reason: e.to_string() });
                }
            }
        }
        info!(
            "Loaded {} documents from {} files ({} skipped)",
            report.documents.len(),
            files.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

fn load_text(path: &Path) -> Result<Vec<Document>> {
    let bytes = fs::read(path)?;
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).to_string(),
    };
    Ok(vec![Document::new(text, Provenance::new(path, None))])
}

fn load_pdf(path: &Path) -> Result<LoadReport> {
    let bytes = fs::read(path)?;
    let pages = match lopdf::Document::load_mem(&bytes) {
        Ok(doc) => {
            let numbers: Vec<u32> = doc.get_pages().into_keys().collect();
            split_pages(numbers, |n| doc.extract_text(&[n]).map_err(|e| e.to_string()))
        }
        Err(e) => {
            warn!("Cannot parse {} page by page ({}), extracting whole file", path.display(), e);
            PageText::default()
        }
    };
    if pages.extracted.is_empty() {
        // Nothing usable per page: whole-file extraction, page unknown.
        let text = pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| Error::Load(format!("{}: {}", path.display(), e)))?;
        return Ok(LoadReport { documents: vec![Document::new(text, Provenance::new(path, None))], skipped: Vec::new() });
    }
    let skipped = pages
        .failed
        .into_iter()
        .map(|(page, reason)| {
            warn!("Skipping page {} of {}: {}", page, path.display(), reason);
            SkippedFile { path: path.to_path_buf(), page: Some(page), reason }
        })
        .collect();
    let documents = pages
        .extracted
        .into_iter()
        .map(|(page, text)| Document::new(text, Provenance::new(path, Some(page))))
        .collect();
    Ok(LoadReport { documents, skipped })
}

#[derive(Debug, Default)]
struct PageText {
    extracted: Vec<(u32, String)>,
    failed: Vec<(u32, String)>,
}

/// Extract each 1-based page on its own so one bad page does not cost the others.
fn split_pages<F>(numbers: Vec<u32>, mut extract: F) -> PageText
where
    F: FnMut(u32) -> std::result::Result<String, String>,
{
    let mut pages = PageText::default();
    for n in numbers {
        match extract(n) {
            Ok(text) => pages.extracted.push((n, text)),
            Err(reason) => pages.failed.push((n, reason)),
        }
    }
    pages
}
