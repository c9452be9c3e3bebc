use async_trait::async_trait;

use crate::error::Result;

/// Maps text to a fixed-dimension vector.
///
/// Implementations must be deterministic for a given model configuration and
/// must not mutate shared state in `embed`, so a single instance can serve
/// concurrent queries.
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier for the model and its configuration, stored in the index manifest.
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Same result as calling `embed` per item; exists for throughput.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// A text completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;

    /// Backend and model, for logging.
    fn name(&self) -> &str;
}
