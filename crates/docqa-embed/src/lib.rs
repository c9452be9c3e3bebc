//! docqa-embed
//!
//! Embedding providers: a local BERT-family sentence embedder (bge by default)
//! run with candle, and a deterministic hashing embedder for tests and
//! development (`APP_USE_FAKE_EMBEDDINGS=1` or `embedding.use_hashing = true`).

pub mod device;
pub mod pool;
pub mod tokenize;

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use docqa_core::config::{EmbeddingSettings, Pooling};
use docqa_core::traits::EmbeddingProvider;
use docqa_core::Error;

pub use pool::{cls_l2, masked_mean_l2};

pub const DEFAULT_MODEL_DIR: &str = "models/bge-base-en-v1.5";
pub const DEFAULT_HASH_DIM: usize = 384;

pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
    pooling: Pooling,
    dim: usize,
    id: String,
}

impl BertEmbedder {
    /// Load `config.json`, `tokenizer.json` and weights from `model_dir`.
    ///
    /// Weights are read from `model.safetensors` when present, otherwise from
    /// `pytorch_model.bin`.
    pub fn new(model_dir: &Path, max_len: usize, pooling: Pooling) -> Result<Self> {
        let device = device::select_device();
        info!("Loading embedding model from {}", model_dir.display());
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&raw_config)?;
        let dim = serde_json::from_str::<serde_json::Value>(&raw_config)?
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))? as usize;

        let safetensors = model_dir.join("model.safetensors");
        let vb = if safetensors.exists() {
            debug!("Loading weights from {}", safetensors.display());
            let bytes = std::fs::read(&safetensors)
                .with_context(|| format!("Failed to read {}", safetensors.display()))?;
            VarBuilder::from_buffered_safetensors(bytes, DType::F32, &device)?
        } else {
            let weights_path = model_dir.join("pytorch_model.bin");
            debug!("Loading weights from {}", weights_path.display());
            let weights = candle_core::pickle::read_all(&weights_path)?;
            let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
            VarBuilder::from_tensors(weights_map, DType::F32, &device)
        };
        let model = BertModel::load(vb, &config)?;
        let pooling_name = match pooling { Pooling::Cls => "cls", Pooling::Mean => "mean" };
        let model_name = model_dir.file_name().map_or_else(|| "bert".to_string(), |n| n.to_string_lossy().to_string());
        let id = format!("bert:{}:{}:d{}", model_name, pooling_name, dim);
        info!("Embedding model ready ({})", id);
        Ok(Self { model, tokenizer, device, max_len, pooling, dim, id })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize::tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = match self.pooling {
            Pooling::Cls => cls_l2(&hidden)?,
            Pooling::Mean => masked_mean_l2(&hidden, &attention_mask.to_dtype(DType::F32)?)?,
        };
        let emb = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1::<f32>()?;
        if emb.len() != self.dim {
            return Err(anyhow!("model produced {} dims, expected {}", emb.len(), self.dim));
        }
        if start.elapsed().as_millis() > 500 { debug!("Slow embedding: {:?}", start.elapsed()); }
        Ok(emb)
    }
}

impl EmbeddingProvider for BertEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn embed(&self, text: &str) -> docqa_core::Result<Vec<f32>> {
        self.embed_text(text).map_err(|e| Error::Embedding(format!("{e:#}")))
    }
}

/// Feature-hashing bag-of-words embedder.
///
/// Lower-cased alphanumeric tokens are hashed with xxHash64 into `dim`
/// buckets and the vector is L2-normalised, so texts sharing words score
/// higher under cosine similarity. Text with no tokens maps to the zero vector.
pub struct HashEmbedder { dim: usize, id: String }

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, id: format!("hash:xxh64:d{dim}") } }
}

impl EmbeddingProvider for HashEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn embed(&self, text: &str) -> docqa_core::Result<Vec<f32>> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        if self.dim == 0 { return Err(Error::Embedding("hash embedder has zero dimensions".into())); }
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let token = token.to_lowercase();
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let weight = 0.5 + ((h >> 32) as u32 as f32) / (u32::MAX as f32);
            v[idx] += weight;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        Ok(v)
    }
}

fn fake_embeddings_requested() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Build the configured embedder.
///
/// Fails with `Error::Embedding` when no model directory can be found or the
/// model cannot be loaded.
pub fn embedder_from_settings(settings: &EmbeddingSettings) -> docqa_core::Result<Arc<dyn EmbeddingProvider>> {
    if settings.use_hashing || fake_embeddings_requested() {
        info!("Using HashEmbedder (d{})", DEFAULT_HASH_DIM);
        return Ok(Arc::new(HashEmbedder::new(DEFAULT_HASH_DIM)));
    }
    let model_dir = resolve_model_dir(settings.model_dir.as_deref()).map_err(|e| Error::Embedding(format!("{e:#}")))?;
    let embedder = BertEmbedder::new(&model_dir, settings.max_len, settings.pooling)
        .map_err(|e| Error::Embedding(format!("{e:#}")))?;
    Ok(Arc::new(embedder))
}

fn resolve_model_dir(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = configured {
        if p.exists() { return Ok(p.to_path_buf()); }
        warn!("Configured model dir {} does not exist", p.display());
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() { info!("Using {}: {}", var, p.display()); return Ok(p); }
        }
    }
    let default = Path::new(DEFAULT_MODEL_DIR);
    if default.exists() { return Ok(default.to_path_buf()); }
    Err(anyhow!("Could not locate an embedding model directory (set embedding.model_dir or APP_MODEL_DIR)"))
}
