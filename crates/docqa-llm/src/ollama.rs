//! Local Ollama server (`/api/generate`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use docqa_core::config::LlmSettings;
use docqa_core::traits::LanguageModel;
use docqa_core::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    name: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let base_url = settings.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        info!("Binding Ollama model {} at {}", settings.model, base_url);
        Ok(Self {
            client: crate::http_client(settings.timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            name: format!("ollama:{}", settings.model),
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest { model: &self.model, prompt, stream: false, options: GenerateOptions { temperature } };
        debug!("POST {} ({} prompt chars)", url, prompt.len());
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Synthesis(format!("Ollama request failed: {}", e)))?;
        let response = crate::ensure_success("Ollama", response).await?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Synthesis(format!("Failed to parse Ollama response: {}", e)))?;
        Ok(body.response)
    }

    fn name(&self) -> &str { &self.name }
}
