//! Grounded answer generation over an OpenAI-compatible chat endpoint.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{RagError, Result, snippet};
use crate::vector_db::Document;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama3-70b-8192";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A remote text-generation capability.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String>;
}

pub struct LLMConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<Duration>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            timeout: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for Groq (or any OpenAI-compatible server).
#[derive(Debug)]
pub struct GroqGenerator {
    client: reqwest::Client,
    url_chat: String,
    api_key: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl GroqGenerator {
    pub fn new(config: &LLMConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(RagError::Config("GROQ_API_KEY is not set".into()));
        }
        let base = config.base_url.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(RagError::Config(format!(
                "base url must be http(s): '{}'",
                config.base_url
            )));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RagError::Config(format!("http client build: {e}")))?;

        info!(endpoint = %base, model = %config.model, "generator initialized");

        Ok(Self {
            client,
            url_chat: format!("{base}/chat/completions"),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Generator for GroqGenerator {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let started = Instant::now();
        let body = ChatCompletionRequest {
            model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        debug!(model, messages = messages.len(), "POST {}", self.url_chat);

        let resp = self
            .client
            .post(&self.url_chat)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::GenerationUnavailable(format!("POST {}: {e}", self.url_chat)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".into());
            let reason = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "authentication failed",
                StatusCode::TOO_MANY_REQUESTS => "rate limited",
                _ => "request failed",
            };
            warn!(%status, reason, "chat completion rejected");
            return Err(RagError::GenerationUnavailable(format!(
                "{reason} ({status}): {}",
                snippet(&body, 200)
            )));
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| RagError::GenerationUnavailable(format!("decode response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RagError::GenerationUnavailable("response has no choices".into()))?;

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            answer_len = text.len(),
            "chat completion done"
        );
        Ok(text)
    }
}

/// Builds grounded prompts and makes one generator call per question.
pub struct AnswerGenerator {
    generator: Arc<dyn Generator>,
    model: String,
    max_context_chars: Option<usize>,
}

impl AnswerGenerator {
    pub fn new(generator: Arc<dyn Generator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
            max_context_chars: None,
        }
    }

    pub fn with_max_context_chars(mut self, limit: Option<usize>) -> Self {
        self.max_context_chars = limit;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Keeps whole passages, in order, while the joined context fits the
    /// limit. The first passage is always kept.
    fn select_passages<'a>(&self, passages: &'a [Document]) -> &'a [Document] {
        let Some(limit) = self.max_context_chars else {
            return passages;
        };
        let mut used = 0usize;
        let mut keep = 0usize;
        for (i, passage) in passages.iter().enumerate() {
            let need = passage.content.chars().count() + usize::from(i > 0);
            if i > 0 && used + need > limit {
                break;
            }
            used += need;
            keep += 1;
        }
        if keep < passages.len() {
            debug!(kept = keep, dropped = passages.len() - keep, limit, "context truncated");
        }
        &passages[..keep]
    }

    pub fn build_system_prompt(&self, passages: &[Document]) -> String {
        let passages = self.select_passages(passages);
        let context = passages
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let sources = passages
            .iter()
            .map(|p| format!("'{}'", p.id))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Instructions:\n\
             - Be concise and accurate.\n\
             - If unsure, say \"I don't know.\"\n\
             Context:\n\
             {context}\n\
             Sources: [{sources}]"
        )
    }

    pub async fn answer(&self, query: &str, passages: &[Document]) -> Result<String> {
        if query.trim().is_empty() {
            return Err(RagError::EmptyQuery);
        }
        let messages = [
            ChatMessage::system(self.build_system_prompt(passages)),
            ChatMessage::user(query),
        ];
        self.generator.chat(&self.model, &messages).await
    }
}
