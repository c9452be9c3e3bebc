//! Prompt assembly and the completion call.

use std::sync::Arc;
use tracing::debug;

use docqa_core::traits::LanguageModel;
use docqa_core::{Chunk, Error, Result};

/// Low temperature; answers should be repeatable.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Separates context chunks inside the prompt.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Grounded question-answering prompt. Chunk texts are inserted verbatim, in order.
pub fn build_prompt(question: &str, context: &[Chunk]) -> String {
    let context = context.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(CONTEXT_DELIMITER);
    format!(
        r#"Use the following pieces of context to answer the user's question.
Answer only from the given context. If the context is insufficient, say "I don't know". Do not make up an answer.

Context:
{context}

Question: {question}

Only return the helpful answer below and nothing else.
Helpful answer:"#
    )
}

pub struct AnswerSynthesizer {
    llm: Arc<dyn LanguageModel>,
    temperature: f32,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self { Self { llm, temperature: DEFAULT_TEMPERATURE } }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn temperature(&self) -> f32 { self.temperature }

    pub fn model_name(&self) -> &str { self.llm.name() }

    /// One completion call, no retries. Any backend failure is `Synthesis`.
    pub async fn synthesize(&self, question: &str, context: &[Chunk]) -> Result<String> {
        let prompt = build_prompt(question, context);
        debug!("Prompting {} with {} context chunks", self.llm.name(), context.len());
        let completion = self.llm.complete(&prompt, self.temperature).await.map_err(|e| match e {
            Error::Synthesis(_) => e,
            other => Error::Synthesis(other.to_string()),
        })?;
        Ok(completion.trim().to_string())
    }
}
