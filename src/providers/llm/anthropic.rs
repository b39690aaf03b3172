use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::sse::{self, SseEvent};
use super::{CompletionRequest, CompletionResponse, LlmProvider, Role, TextStream, Usage};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

pub struct AnthropicProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl AnthropicProvider {
    pub fn new(api_key: Option<String>, model: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.filter(|k| !k.is_empty()),
            model,
            timeout,
        }
    }

    fn build_request<'a>(&'a self, request: &'a CompletionRequest, stream: bool) -> MessageRequest<'a> {
        // The system prompt travels outside the message list.
        let mut system = None;
        let mut messages = Vec::with_capacity(request.messages.len());
        for message in &request.messages {
            match message.role {
                Role::System => system = Some(message.content.clone()),
                Role::User => messages.push(ApiMessage {
                    role: "user",
                    content: &message.content,
                }),
                Role::Assistant => messages.push(ApiMessage {
                    role: "assistant",
                    content: &message.content,
                }),
            }
        }

        MessageRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            messages,
            system,
            temperature: request.temperature,
            stream,
        }
    }

    async fn send(&self, body: &MessageRequest<'_>) -> Result<reqwest::Response> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::LlmApi("Anthropic API key is not configured".to_string()))?;

        let mut builder = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body);
        // Streamed bodies are only bounded by the idle read timeout.
        if !body.stream {
            builder = builder.timeout(self.timeout);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::LlmApi(format!("Anthropic {}: {}", status, error_text)));
        }

        Ok(response)
    }
}

fn parse_stream_event(data: &str) -> Result<SseEvent> {
    let Ok(event) = serde_json::from_str::<StreamEvent>(data) else {
        return Ok(SseEvent::Skip);
    };

    match event.event_type.as_str() {
        "content_block_delta" => Ok(event
            .delta
            .and_then(|d| d.text)
            .filter(|t| !t.is_empty())
            .map(SseEvent::Delta)
            .unwrap_or(SseEvent::Skip)),
        "message_stop" => Ok(SseEvent::Done),
        "error" => Err(AppError::LlmApi(
            event
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "stream error".to_string()),
        )),
        _ => Ok(SseEvent::Skip),
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = self.build_request(&request, false);
        let response = self.send(&body).await?;
        let message_response: MessageResponse = response.json().await?;

        let content = message_response
            .content
            .into_iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        let usage = message_response.usage;
        Ok(CompletionResponse {
            content,
            finish_reason: message_response.stop_reason.unwrap_or_default(),
            usage: Usage {
                prompt_tokens: usage.input_tokens,
                completion_tokens: usage.output_tokens,
                total_tokens: usage.input_tokens + usage.output_tokens,
            },
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<TextStream> {
        let body = self.build_request(&request, true);
        let response = self.send(&body).await?;
        Ok(sse::text_stream(response, parse_stream_event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::Message;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new(Some("key".into()), "claude-test".into(), Duration::from_secs(5))
    }

    #[test]
    fn system_message_is_lifted_out_of_the_list() {
        let provider = provider();
        let request = CompletionRequest {
            messages: vec![Message::system("be brief"), Message::user("hello")],
            max_tokens: 10,
            temperature: 0.1,
        };
        let body = provider.build_request(&request, false);
        assert_eq!(body.system.as_deref(), Some("be brief"));
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].role, "user");

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("stream").is_none());
    }

    #[test]
    fn empty_key_is_unavailable() {
        let provider = AnthropicProvider::new(Some(String::new()), "m".into(), Duration::from_secs(1));
        assert!(!provider.available());
    }

    #[test]
    fn stream_events_map_to_deltas_and_stop() {
        let delta = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#;
        assert!(matches!(parse_stream_event(delta), Ok(SseEvent::Delta(t)) if t == "Hi"));
        assert!(matches!(
            parse_stream_event(r#"{"type":"message_stop"}"#),
            Ok(SseEvent::Done)
        ));
        assert!(matches!(parse_stream_event("ping"), Ok(SseEvent::Skip)));
        assert!(parse_stream_event(r#"{"type":"error","error":{"message":"overloaded"}}"#).is_err());
    }
}
