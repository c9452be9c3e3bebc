//! docqa-llm
//!
//! Language-model backends behind `docqa_core::traits::LanguageModel`:
//! Groq's OpenAI-compatible chat API and a local Ollama server. Calls are
//! made once; retries belong to whoever hosts the pipeline.

pub mod groq;
pub mod ollama;

use std::sync::Arc;
use std::time::Duration;

use docqa_core::config::{LlmProvider, LlmSettings};
use docqa_core::traits::LanguageModel;
use docqa_core::{Error, Result};

pub use groq::GroqClient;
pub use ollama::OllamaClient;

/// Bind the backend selected by `llm.provider`.
///
/// Fails with `Error::Configuration` when the backend needs credentials that
/// are not configured.
pub fn build_language_model(settings: &LlmSettings) -> Result<Arc<dyn LanguageModel>> {
    match settings.provider {
        LlmProvider::Groq => Ok(Arc::new(GroqClient::new(settings)?)),
        LlmProvider::Ollama => Ok(Arc::new(OllamaClient::new(settings)?)),
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a non-success response into a synthesis error carrying the body.
pub(crate) async fn ensure_success(backend: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Synthesis(format!("{} request failed: HTTP {} - {}", backend, status, body)))
}
