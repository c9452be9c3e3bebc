//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (`__` separates nested keys, e.g. `APP_LLM__MODEL`).
//! A `.env` file next to the config files is loaded into the process
//! environment first, without overriding variables that are already set.
//! Configured paths get `~` and `${VAR}` expanded.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    /// Relative data and model paths are resolved against this directory.
    base: Option<PathBuf>,
}

impl Config {
    /// Load configuration files from the current working directory.
    /// Relative paths stay relative to it.
    pub fn load() -> Result<Self> {
        let figment = Self::layered(Path::new("."))?;
        Ok(Self { figment, base: None })
    }

    /// Load configuration files from `dir`; relative paths in them are
    /// resolved against `dir`.
    pub fn load_in(dir: &Path) -> Result<Self> {
        let figment = Self::layered(dir)?;
        Ok(Self { figment, base: Some(dir.to_path_buf()) })
    }

    fn layered(dir: &Path) -> Result<Figment> {
        load_dotenv(dir)?;
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(figment)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment, base: None }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::Configuration(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract and validate the full settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        if settings.llm.api_key.is_none() {
            settings.llm.api_key = env::var("GROQ_API_KEY").ok().filter(|k| !k.trim().is_empty());
        }
        settings.resolve_paths(self.base.as_deref());
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Configuration("chunking.chunk_size must be positive".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Configuration(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Configuration("retrieval.top_k must be positive".into()));
        }
        if !(self.llm.temperature.is_finite() && self.llm.temperature >= 0.0) {
            return Err(Error::Configuration(format!(
                "llm.temperature must be a non-negative number, got {}",
                self.llm.temperature
            )));
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: Option<&Path>) {
        let fix = |p: &Path| match base {
            Some(base) => resolve_with_base(base, p),
            None => expand_path(p),
        };
        self.data.source_dir = fix(&self.data.source_dir);
        self.data.index_dir = fix(&self.data.index_dir);
        self.embedding.model_dir = self.embedding.model_dir.as_deref().map(fix);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    pub source_dir: PathBuf,
    pub index_dir: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { source_dir: PathBuf::from("data/pdfs"), index_dir: PathBuf::from("vectorstore/index") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// First-token representation (bge family).
    Cls,
    /// Attention-masked mean over tokens.
    Mean,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub model_dir: Option<PathBuf>,
    pub use_hashing: bool,
    pub max_len: usize,
    pub pooling: Pooling,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: None, use_hashing: false, max_len: 512, pooling: Pooling::Cls }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Groq,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub api_key: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Groq,
            model: "llama3-8b-8192".to_string(),
            base_url: None,
            temperature: 0.1,
            timeout_secs: 60,
            api_key: None,
        }
    }
}

/// Read `dir/.env` into the process environment. A missing file is fine.
fn load_dotenv(dir: &Path) -> Result<()> {
    let path = dir.join(".env");
    match dotenvy::from_path(&path) {
        Ok(()) => {
            debug!("Loaded environment from {}", path.display());
            Ok(())
        }
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(Error::Configuration(format!("invalid {}: {}", path.display(), e))),
    }
}

/// `~`, `$VAR` and `${VAR}` expanded. A path naming an unset variable is
/// returned unchanged.
pub fn expand_path(input: impl AsRef<Path>) -> PathBuf {
    let raw = input.as_ref().to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            warn!("Cannot expand {}: {}", raw, e);
            PathBuf::from(raw.as_ref())
        }
    }
}

/// `path` after expansion, joined onto `base` unless it is absolute.
pub fn resolve_with_base(base: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = expand_path(path);
    if path.is_absolute() { path } else { base.join(path) }
}
