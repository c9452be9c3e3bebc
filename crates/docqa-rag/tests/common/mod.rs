#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use docqa_core::traits::LanguageModel;
use docqa_core::{Error, Result};

pub fn write_pdf(path: &Path, pages: &[&str]) {
    docqa_core::testing::write_pdf(path, pages).expect("write pdf");
}

pub const HANDBOOK_PAGES: [&str; 3] = [
    "Welcome to the company handbook.",
    "The office opens at nine in the morning and closes at six.",
    "Employees receive 15 vacation days per year.",
];

/// Answers with the first context sentence that contains a number and shares
/// a word with the question, or "I don't know".
pub struct ExtractiveModel;

pub fn section<'a>(prompt: &'a str, start: &str, end: &str) -> &'a str {
    let from = prompt.find(start).map_or(0, |i| i + start.len());
    let to = prompt[from..].find(end).map_or(prompt.len(), |i| from + i);
    &prompt[from..to]
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl LanguageModel for ExtractiveModel {
    async fn complete(&self, prompt: &str, _temperature: f32) -> Result<String> {
        let context = section(prompt, "Context:\n", "\n\nQuestion:");
        let question = words(section(prompt, "Question: ", "\n"));
        let found = context
            .split(['.', '\n'])
            .map(str::trim)
            .find(|s| s.chars().any(|c| c.is_ascii_digit()) && words(s).iter().any(|w| question.contains(w)));
        Ok(match found {
            Some(sentence) => format!("  {}.\n", sentence),
            None => "I don't know.".to_string(),
        })
    }

    fn name(&self) -> &str { "extractive" }
}

/// Records every prompt and temperature and replies with a fixed string.
pub struct RecordingModel {
    pub reply: String,
    pub calls: Mutex<Vec<(String, f32)>>,
}

impl RecordingModel {
    pub fn new(reply: &str) -> Arc<Self> { Arc::new(Self { reply: reply.to_string(), calls: Mutex::new(Vec::new()) }) }
}

#[async_trait]
impl LanguageModel for RecordingModel {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        self.calls.lock().unwrap().push((prompt.to_string(), temperature));
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str { "recording" }
}

pub struct FailingModel;

#[async_trait]
impl LanguageModel for FailingModel {
    async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        Err(Error::Io(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "backend down")))
    }

    fn name(&self) -> &str { "failing" }
}
