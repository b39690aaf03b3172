use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::sse::{self, SseEvent};
use super::{CompletionRequest, CompletionResponse, LlmProvider, Message, TextStream, Usage};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
    #[serde(default)]
    delta: Option<ChoiceMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Client for the OpenAI chat-completions API and compatible local servers
/// (Ollama, llama.cpp, vLLM).
pub struct OpenAiProvider {
    name: &'static str,
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(api_key: Option<String>, base_url: String, model: String, timeout: Duration) -> Self {
        Self::build("openai", api_key.filter(|k| !k.is_empty()), base_url, model, timeout)
    }

    /// Keyless, OpenAI-compatible server such as a local Ollama instance.
    pub fn local(base_url: String, model: String, timeout: Duration) -> Self {
        Self::build("local", None, base_url, model, timeout)
    }

    fn build(
        name: &'static str,
        api_key: Option<String>,
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            name,
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let mut builder = self.client.post(self.endpoint()).json(body);
        // Streamed bodies are only bounded by the idle read timeout.
        if !body.stream {
            builder = builder.timeout(self.timeout);
        }
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        } else if self.name == "openai" {
            return Err(AppError::LlmApi("OpenAI API key is not configured".to_string()));
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::LlmApi(format!("{} {}: {}", self.name, status, error_text)));
        }
        Ok(response)
    }
}

fn parse_stream_chunk(data: &str) -> Result<SseEvent> {
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }
    let Ok(chunk) = serde_json::from_str::<ChatResponse>(data) else {
        return Ok(SseEvent::Skip);
    };
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .filter(|t| !t.is_empty())
        .map(SseEvent::Delta)
        .unwrap_or(SseEvent::Skip))
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn available(&self) -> bool {
        self.name == "local" || self.api_key.is_some()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
        };
        let response: ChatResponse = self.send(&body).await?.json().await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LlmApi(format!("{} returned no choices", self.name)))?;

        let usage = response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.and_then(|m| m.content).unwrap_or_default(),
            finish_reason: choice.finish_reason.unwrap_or_default(),
            usage,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<TextStream> {
        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: true,
        };
        let response = self.send(&body).await?;
        Ok(sse::text_stream(response, parse_stream_chunk))
    }
}
