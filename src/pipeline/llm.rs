//! Language-model seam: one async trait between the pipeline and any LLM.
//!
//! The planner and the generator only ever talk to [`LanguageModel`]. The
//! production implementation, [`ProviderModel`], forwards to an
//! `edgequake_llm` provider; tests plug in scripted models.
//!
//! Timeouts are applied by the callers (`tokio::time::timeout` around
//! [`LanguageModel::complete`]) so that a timeout is accounted for the same
//! way whatever the backend.
//!
//! This module also owns [`parse_json_object`], the reply-side counterpart:
//! models frequently wrap JSON in a ```` ```json ```` fence despite being
//! told not to.

use crate::slide::SlideType;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::ops::AddAssign;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// What a request is for. Carried for logging and for scripted test models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTask {
    Planning,
    Slide {
        slide_number: usize,
        slide_type: SlideType,
        /// 1-based attempt number.
        attempt: u32,
    },
}

impl fmt::Display for ModelTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelTask::Planning => f.write_str("planning"),
            ModelTask::Slide {
                slide_number,
                slide_type,
                attempt,
            } => write!(f, "slide {slide_number} ({slide_type}) attempt {attempt}"),
        }
    }
}

/// One chat completion: a system message and a user message.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub task: ModelTask,
}

/// Token counts reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub content: String,
    pub usage: TokenUsage,
}

/// Failure of the call itself, as opposed to a bad reply.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// Network, HTTP status, quota or any other provider-side failure.
    #[error("{0}")]
    Transport(String),

    /// The provider answered with no text at all.
    #[error("provider returned an empty response")]
    EmptyResponse,
}

/// An LLM that can answer a system + user prompt pair.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError>;

    /// Model name for logging.
    fn model_name(&self) -> &str {
        "unknown"
    }
}

/// [`LanguageModel`] backed by an `edgequake_llm` provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    model_name: String,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>, model_name: impl Into<String>) -> Self {
        Self {
            provider,
            model_name: model_name.into(),
        }
    }
}

#[async_trait]
impl LanguageModel for ProviderModel {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        let messages = vec![
            ChatMessage::system(request.system.as_str()),
            ChatMessage::user(request.user.as_str()),
        ];
        let options = build_options(request);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ModelError::Transport(format!("{}", e)))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            request.task, response.prompt_tokens, response.completion_tokens
        );

        if response.content.trim().is_empty() {
            return Err(ModelError::EmptyResponse);
        }

        Ok(ModelResponse {
            content: response.content,
            usage: TokenUsage {
                input_tokens: response.prompt_tokens as u64,
                output_tokens: response.completion_tokens as u64,
            },
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Build `CompletionOptions` from a request.
///
/// Every call in this crate expects a single JSON object back, so the
/// provider is always asked for `json_object` output.
fn build_options(request: &ModelRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        response_format: Some(JSON_OBJECT_FORMAT.to_string()),
        ..Default::default()
    }
}

/// `response_format` value that puts the provider in JSON mode.
const JSON_OBJECT_FORMAT: &str = "json_object";

// ── Reply parsing ────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

/// Remove one surrounding ```` ``` ```` / ```` ```json ```` fence, if present.
pub fn strip_json_fences(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => trimmed,
    }
}

/// Parse a model reply into a JSON object.
///
/// The error string describes what was wrong and is suitable as retry
/// feedback.
pub fn parse_json_object(reply: &str) -> Result<Value, String> {
    let body = strip_json_fences(reply);
    if body.is_empty() {
        return Err("empty response".to_string());
    }
    let value: Value = serde_json::from_str(body).map_err(|e| e.to_string())?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(format!("expected a JSON object, got `{}`", abbreviate(body, 40)))
    }
}

fn abbreviate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}…", &s[..i]),
        None => s.to_string(),
    }
}
