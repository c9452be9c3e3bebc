//! On-disk form of a `VectorIndex`.
//!
//! Layout of an index directory:
//! - `manifest.json`: format version, metric, dimension, row count, embedder id
//! - `lance/`: LanceDB database holding the `chunks` table (absent when empty)
//!
//! `save` writes a sibling staging directory and swaps it into place, so a
//! reader never observes a half-written index. During the swap the path is
//! briefly absent and `load` reports `IndexNotFound`; if the swap fails the
//! previous index is put back.

use anyhow::{anyhow, Context};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray, UInt32Array};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use docqa_core::error::{Error, Result};
use docqa_core::types::{Chunk, Provenance};

use crate::schema::{build_arrow_schema, TABLE_NAME};
use crate::{VectorIndex, METRIC};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const LANCE_DIR: &str = "lance";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub metric: String,
    pub dim: usize,
    pub count: usize,
    pub embedder_id: Option<String>,
}

impl Manifest {
    pub fn read(index_dir: &Path) -> Result<Self> {
        let path = index_dir.join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| Error::index_not_found(index_dir, format!("cannot read {MANIFEST_FILE}: {e}")))?;
        let manifest: Manifest = serde_json::from_str(&raw)
            .map_err(|e| Error::index_not_found(index_dir, format!("invalid {MANIFEST_FILE}: {e}")))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(Error::index_not_found(
                index_dir,
                format!("unsupported format version {}", manifest.format_version),
            ));
        }
        if manifest.metric != METRIC {
            return Err(Error::index_not_found(index_dir, format!("unsupported metric {}", manifest.metric)));
        }
        Ok(manifest)
    }
}

pub async fn open_db(uri: &str) -> anyhow::Result<Connection> {
    Ok(connect(uri).execute().await?)
}

impl VectorIndex {
    /// Persist the full index (vectors, chunk text, provenance) under `path`,
    /// replacing any index already there.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let staging = sibling(path, "staging");
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        std::fs::create_dir_all(&staging)?;
        self.write_into(&staging).await.map_err(|e| Error::Storage(format!("{e:#}")))?;

        swap_into_place(&staging, path)?;
        info!("Saved index with {} entries to {}", self.len(), path.display());
        Ok(())
    }

    async fn write_into(&self, dir: &Path) -> anyhow::Result<()> {
        if let Some(dim) = self.dim() {
            let batch = self.to_record_batch(dim)?;
            let schema = batch.schema();
            let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
            let db = open_db(&dir.join(LANCE_DIR).to_string_lossy()).await?;
            db.create_table(TABLE_NAME, reader).execute().await?;
        }
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            metric: METRIC.to_string(),
            dim: self.dim().unwrap_or(0),
            count: self.len(),
            embedder_id: self.embedder_id().map(str::to_string),
        };
        std::fs::write(dir.join(MANIFEST_FILE), serde_json::to_string_pretty(&manifest)?)?;
        Ok(())
    }

    fn to_record_batch(&self, dim: usize) -> anyhow::Result<RecordBatch> {
        let dim = i32::try_from(dim).context("embedding dimension too large")?;
        let schema = build_arrow_schema(dim);
        let n = self.len();
        let mut ordinals = Vec::with_capacity(n); let mut ids = Vec::with_capacity(n); let mut sources = Vec::with_capacity(n);
        let mut pages = Vec::with_capacity(n); let mut chunk_indices = Vec::with_capacity(n); let mut texts = Vec::with_capacity(n);
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(n);
        for (i, entry) in self.entries().iter().enumerate() {
            let c = &entry.chunk;
            ordinals.push(u32::try_from(i)?); ids.push(c.id.clone()); sources.push(c.provenance.source.to_string_lossy().to_string());
            pages.push(c.provenance.page); chunk_indices.push(u32::try_from(c.chunk_index)?); texts.push(c.text.clone());
            vectors.push(Some(entry.embedding.iter().map(|&x| Some(x)).collect()));
        }
        let record_batch = RecordBatch::try_new(schema, vec![
            Arc::new(UInt32Array::from(ordinals)),
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(sources)),
            Arc::new(UInt32Array::from(pages)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(texts)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim)),
        ])?;
        Ok(record_batch)
    }

    /// Restore an index written by `save`.
    ///
    /// Fails with `IndexNotFound` when `path` holds no manifest, the table is
    /// missing, or the stored rows disagree with the manifest.
    pub async fn load(path: &Path) -> Result<Self> {
        let manifest = Manifest::read(path)?;
        if manifest.count == 0 {
            debug!("Index at {} is empty", path.display());
            let index = VectorIndex::build(Vec::new(), Vec::new())?;
            return Ok(match manifest.embedder_id { Some(id) => index.with_embedder_id(id), None => index });
        }
        let rows = read_rows(path, &manifest)
            .await
            .map_err(|e| Error::index_not_found(path, format!("{e:#}")))?;
        let (chunks, embeddings): (Vec<Chunk>, Vec<Vec<f32>>) = rows.into_iter().unzip();
        let index = VectorIndex::build(chunks, embeddings)
            .map_err(|e| Error::index_not_found(path, format!("stored rows are inconsistent: {e}")))?;
        info!("Loaded index with {} entries (d{}) from {}", index.len(), manifest.dim, path.display());
        Ok(match manifest.embedder_id { Some(id) => index.with_embedder_id(id), None => index })
    }
}

async fn read_rows(path: &Path, manifest: &Manifest) -> anyhow::Result<Vec<(Chunk, Vec<f32>)>> {
    let db = open_db(&path.join(LANCE_DIR).to_string_lossy()).await?;
    let names = db.table_names().execute().await?;
    if !names.iter().any(|n| n == TABLE_NAME) {
        return Err(anyhow!("table '{}' is missing", TABLE_NAME));
    }
    let table = db.open_table(TABLE_NAME).execute().await?;
    let batches: Vec<RecordBatch> = table.query().limit(manifest.count).execute().await?.try_collect().await?;

    let mut rows: Vec<(u32, Chunk, Vec<f32>)> = Vec::with_capacity(manifest.count);
    for batch in &batches {
        let ordinal = u32_column(batch, "ordinal")?;
        let id = string_column(batch, "id")?;
        let source = string_column(batch, "source")?;
        let page = u32_column(batch, "page")?;
        let chunk_index = u32_column(batch, "chunk_index")?;
        let text = string_column(batch, "text")?;
        let vector = batch
            .column_by_name("vector")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| anyhow!("vector column missing"))?;
        for i in 0..batch.num_rows() {
            let values = vector.value(i);
            let embedding = values.as_primitive::<Float32Type>().values().to_vec();
            let page = if page.is_null(i) { None } else { Some(page.value(i)) };
            let chunk = Chunk {
                id: id.value(i).to_string(),
                text: text.value(i).to_string(),
                provenance: Provenance::new(PathBuf::from(source.value(i)), page),
                chunk_index: chunk_index.value(i) as usize,
            };
            rows.push((ordinal.value(i), chunk, embedding));
        }
    }
    if rows.len() != manifest.count {
        return Err(anyhow!("manifest lists {} rows, table holds {}", manifest.count, rows.len()));
    }
    if let Some((_, _, e)) = rows.iter().find(|(_, _, e)| e.len() != manifest.dim) {
        return Err(anyhow!("manifest dimension {} but stored vector has {}", manifest.dim, e.len()));
    }
    rows.sort_by_key(|(ordinal, _, _)| *ordinal);
    Ok(rows.into_iter().map(|(_, chunk, e)| (chunk, e)).collect())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> anyhow::Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("{} column missing", name))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> anyhow::Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
        .ok_or_else(|| anyhow!("{} column missing", name))
}

/// Move `staging` to `path`. An existing index at `path` is moved aside
/// first and restored if the second rename fails.
pub(crate) fn swap_into_place(staging: &Path, path: &Path) -> Result<()> {
    if !path.exists() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(staging, path)?;
        return Ok(());
    }
    let old = sibling(path, "old");
    if old.exists() {
        std::fs::remove_dir_all(&old)?;
    }
    std::fs::rename(path, &old)?;
    if let Err(e) = std::fs::rename(staging, path) {
        warn!("Swapping in {} failed ({}), restoring previous index", path.display(), e);
        std::fs::rename(&old, path)
            .map_err(|re| Error::Storage(format!("swap failed ({e}) and restore failed ({re}); previous index left at {}", old.display())))?;
        return Err(Error::Storage(format!("cannot move {} into place: {e}", staging.display())));
    }
    std::fs::remove_dir_all(&old)?;
    Ok(())
}

/// `<dir>.<suffix>` next to `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_else(|| OsString::from("index"));
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn failed_swap_restores_the_previous_index() {
        let tmp = TempDir::new().unwrap();
        let live = tmp.path().join("index");
        std::fs::create_dir_all(&live).unwrap();
        std::fs::write(live.join(MANIFEST_FILE), "previous").unwrap();

        // Staging was never written, so the second rename fails.
        let err = swap_into_place(&tmp.path().join("index.staging"), &live).unwrap_err();

        assert!(matches!(err, Error::Storage(_)), "got {err:?}");
        assert_eq!(std::fs::read_to_string(live.join(MANIFEST_FILE)).unwrap(), "previous");
        assert!(!sibling(&live, "old").exists());
    }

    #[test]
    fn swap_replaces_an_existing_index() {
        let tmp = TempDir::new().unwrap();
        let live = tmp.path().join("index");
        let staging = sibling(&live, "staging");
        std::fs::create_dir_all(&live).unwrap();
        std::fs::write(live.join(MANIFEST_FILE), "previous").unwrap();
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join(MANIFEST_FILE), "next").unwrap();

        swap_into_place(&staging, &live).unwrap();

        assert_eq!(std::fs::read_to_string(live.join(MANIFEST_FILE)).unwrap(), "next");
        assert!(!staging.exists());
        assert!(!sibling(&live, "old").exists());
    }
}
