//! Language-model capability.
//!
//! The backend is chosen once at startup by [`build_llm_provider`] and passed
//! down as an `Arc<dyn LlmProvider>`; nothing below that point cares which
//! vendor is answering.

mod anthropic;
mod openai;
mod sse;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::config::{Config, ProviderKind};
use crate::error::Result;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
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

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    /// Single-turn request with one user message.
    pub fn prompt(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
            max_tokens,
            temperature,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub content: String,
    pub finish_reason: String,
    pub usage: Usage,
}

/// Incremental text deltas. The stream ends when the vendor signals
/// completion; an `Err` item is the last item yielded.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// False when the backend is missing credentials it needs.
    fn available(&self) -> bool;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    async fn stream(&self, request: CompletionRequest) -> Result<TextStream>;
}

/// Build the configured backend, or `kind` when the caller overrides it.
pub fn build_llm_provider(config: &Config, kind: Option<ProviderKind>) -> Arc<dyn LlmProvider> {
    let timeout = config.request_timeout();
    match kind.unwrap_or(config.default_provider) {
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(
            config.anthropic.api_key.clone(),
            config.anthropic.model.clone(),
            timeout,
        )),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
            config.openai.api_key.clone(),
            config.openai.base_url.clone(),
            config.openai.model.clone(),
            timeout,
        )),
        ProviderKind::Local => Arc::new(OpenAiProvider::local(
            config.local.base_url.clone(),
            config.local.model.clone(),
            timeout,
        )),
    }
}
