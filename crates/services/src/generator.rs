use std::env;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use lunora_core::model::QuestionDraft;

use crate::error::GeneratorError;

#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl GeneratorConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("LUNORA_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("LUNORA_AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("LUNORA_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Turns learner-supplied source text into multiple-choice question drafts.
///
/// The model is asked for a bare JSON array of question objects grouped by
/// subtopic; everything past payload parsing (IDs, normalization, bucket
/// placement) is the session's job, so drafts come back unvalidated.
#[derive(Clone)]
pub struct QuestionGenerator {
    client: Client,
    config: Option<GeneratorConfig>,
}

impl QuestionGenerator {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(GeneratorConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<GeneratorConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Generate a quiz for the given source text.
    ///
    /// # Errors
    ///
    /// Returns `GeneratorError` when the service is disabled, the request
    /// fails, or the response is not a question list.
    pub async fn generate_questions(
        &self,
        source_text: &str,
        subject: &str,
    ) -> Result<Vec<QuestionDraft>, GeneratorError> {
        let prompt = build_quiz_prompt(subject, source_text);
        let content = self.chat(prompt).await?;
        parse_question_payload(&content)
    }

    /// Generate extra questions for one subtopic.
    ///
    /// Existing prompts are passed along so the model avoids repeating
    /// itself; the caller force-tags the result into the target bucket when
    /// appending.
    ///
    /// # Errors
    ///
    /// Returns `GeneratorError` when the service is disabled, the request
    /// fails, or the response is not a question list.
    pub async fn generate_extra_questions(
        &self,
        existing_prompts: &[String],
        subtopic: &str,
        source_text: &str,
    ) -> Result<Vec<QuestionDraft>, GeneratorError> {
        let prompt = build_extra_prompt(existing_prompts, subtopic, source_text);
        let content = self.chat(prompt).await?;
        parse_question_payload(&content)
    }

    async fn chat(&self, prompt: String) -> Result<String, GeneratorError> {
        let config = self.config.as_ref().ok_or(GeneratorError::Disabled)?;

        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeneratorError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GeneratorError::EmptyResponse)?;

        Ok(content.trim().to_string())
    }
}

fn build_quiz_prompt(subject: &str, source_text: &str) -> String {
    format!(
        "You are writing a multiple-choice quiz on {subject}.\n\
         Produce a JSON array of question objects with fields \
         `prompt`, `subtopic`, `options` (2-4 strings) and \
         `correct_answer_index`. Group related questions under shared \
         subtopic labels. Return only the JSON array.\n\n\
         Source material:\n{source_text}"
    )
}

fn build_extra_prompt(existing_prompts: &[String], subtopic: &str, source_text: &str) -> String {
    format!(
        "Write additional multiple-choice practice questions for the \
         subtopic \"{subtopic}\" as a JSON array of objects with fields \
         `prompt`, `subtopic`, `options` (2-4 strings) and \
         `correct_answer_index`. Do not repeat any of these existing \
         questions:\n{}\n\nSource material:\n{source_text}",
        existing_prompts.join("\n")
    )
}

/// Parse the model's reply into question drafts, tolerating a fenced code
/// block around the JSON array.
fn parse_question_payload(content: &str) -> Result<Vec<QuestionDraft>, GeneratorError> {
    let mut trimmed = content.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        trimmed = rest.strip_suffix("```").unwrap_or(rest).trim();
    }
    if trimmed.is_empty() {
        return Err(GeneratorError::EmptyResponse);
    }
    Ok(serde_json::from_str(trimmed)?)
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
