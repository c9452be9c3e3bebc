//! Groq chat completions (OpenAI-compatible).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use docqa_core::config::LlmSettings;
use docqa_core::traits::LanguageModel;
use docqa_core::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub struct GroqClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    name: String,
}

#[derive(Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub temperature: f32,
}

#[derive(Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Deserialize)]
pub(crate) struct Choice {
    pub message: ResponseMessage,
}

#[derive(Deserialize)]
pub(crate) struct ResponseMessage {
    pub content: Option<String>,
}

impl GroqClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Configuration("GROQ_API_KEY is not set (llm.api_key)".into()))?;
        let base_url = settings.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        info!("Binding Groq model {}", settings.model);
        Ok(Self {
            client: crate::http_client(settings.timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
            name: format!("groq:{}", settings.model),
        })
    }
}

pub(crate) fn first_choice(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::Synthesis("completion contained no choices".into()))
}

#[async_trait]
impl LanguageModel for GroqClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature,
        };
        debug!("POST {} ({} prompt chars)", url, prompt.len());
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Synthesis(format!("Groq request failed: {}", e)))?;
        let response = crate::ensure_success("Groq", response).await?;
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Synthesis(format!("Failed to parse Groq response: {}", e)))?;
        first_choice(body)
    }

    fn name(&self) -> &str { &self.name }
}
