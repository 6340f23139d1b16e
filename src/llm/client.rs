//! Generation client abstraction with multi-provider support (OpenAI, Anthropic)
//!
//! Each backend maps its native streaming primitive onto a shared lazy
//! text-fragment stream so the router stays backend-agnostic.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::llm::error::LlmError;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default max tokens for the Anthropic messages API, which requires the field
const ANTHROPIC_DEFAULT_MAX_TOKENS: u32 = 4096;

/// Lazy sequence of text fragments; concatenation of all fragments equals
/// the full response. A non-streamed call yields exactly one fragment.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

/// Backend identity. Exactly two remote generation services are supported,
/// selected per call or as a process-wide default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            other => anyhow::bail!("unknown provider: {}", other),
        }
    }
}

/// Per-call generation options. Defaults match what agents forward verbatim.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
            stream: false,
        }
    }
}

impl GenerationOptions {
    /// Default options with only the streaming flag set.
    pub fn streaming(stream: bool) -> Self {
        Self {
            stream,
            ..Default::default()
        }
    }
}

/// Uniform generation capability, implemented once per LLM backend.
///
/// Stateless across calls: no session or conversation memory is retained
/// between invocations, so one instance may be shared read-only across
/// concurrent requests.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// The backend this client addresses.
    fn provider(&self) -> Provider;

    /// Produce a lazy fragment stream for the prompt.
    ///
    /// Remote failures surface as `LlmError::Generation`; there is no
    /// automatic retry at this layer.
    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<TextStream, LlmError>;
}

/// Extract complete SSE `data:` payloads from the buffer, leaving any
/// partial trailing event in place.
fn drain_sse_data(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();
    while let Some(pos) = buffer.find("\n\n") {
        let event = buffer[..pos].to_string();
        *buffer = buffer[pos + 2..].to_string();

        for line in event.lines() {
            if let Some(data) = line.strip_prefix("data: ") {
                payloads.push(data.to_string());
            }
        }
    }
    payloads
}

/// Single-fragment stream holding the full response.
fn once_stream(content: String) -> TextStream {
    stream::once(async move { Ok(content) }).boxed()
}

// ============ OpenAI ============

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatTurn<'a> {
    role: &'a str,
    content: &'a str,
}

/// OpenAI chat-completions client.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Arc<Client>,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Arc::new(Client::new()),
            api_key,
            model,
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    /// Point the client at a custom OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    async fn send_request(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<reqwest::Response, LlmError> {
        let request = OpenAiRequest {
            model: &self.model,
            messages: vec![ChatTurn {
                role: "user",
                content: prompt,
            }],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: options.stream,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::generation(Provider::OpenAi, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::generation(
                Provider::OpenAi,
                format!("API error ({}): {}", status, body),
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<TextStream, LlmError> {
        let response = self.send_request(prompt, &options).await?;

        if !options.stream {
            let body = response
                .text()
                .await
                .map_err(|e| LlmError::generation(Provider::OpenAi, e.to_string()))?;
            let raw: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
                LlmError::generation(Provider::OpenAi, format!("malformed response: {}", e))
            })?;

            let content = raw
                .get("choices")
                .and_then(|c| c.as_array())
                .and_then(|arr| arr.first())
                .and_then(|choice| choice.get("message"))
                .and_then(|msg| msg.get("content"))
                .and_then(|c| c.as_str())
                .unwrap_or_default()
                .to_string();

            return Ok(once_stream(content));
        }

        let (tx, rx) = mpsc::channel::<Result<String, LlmError>>(32);
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx
                            .send(Err(LlmError::generation(Provider::OpenAi, e.to_string())))
                            .await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                for data in drain_sse_data(&mut buffer) {
                    if data == "[DONE]" {
                        continue;
                    }
                    let Ok(event) = serde_json::from_str::<serde_json::Value>(&data) else {
                        continue;
                    };
                    let delta = event
                        .get("choices")
                        .and_then(|c| c.as_array())
                        .and_then(|arr| arr.first())
                        .and_then(|choice| choice.get("delta"))
                        .and_then(|d| d.get("content"))
                        .and_then(|c| c.as_str());
                    if let Some(text) = delta {
                        if !text.is_empty() && tx.send(Ok(text.to_string())).await.is_err() {
                            // Consumer cancelled; stop pulling
                            return;
                        }
                    }
                }
            }
            debug!("openai stream complete");
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

// ============ Anthropic ============

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatTurn<'a>>,
    temperature: f32,
    stream: bool,
}

/// Anthropic messages API client.
#[derive(Clone)]
pub struct AnthropicClient {
    client: Arc<Client>,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Arc::new(Client::new()),
            api_key,
            model,
            base_url: ANTHROPIC_BASE_URL.to_string(),
        }
    }

    /// Point the client at a custom endpoint.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    async fn send_request(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<reqwest::Response, LlmError> {
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: options.max_tokens.unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
            messages: vec![ChatTurn {
                role: "user",
                content: prompt,
            }],
            temperature: options.temperature,
            stream: options.stream,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::generation(Provider::Anthropic, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::generation(
                Provider::Anthropic,
                format!("API error ({}): {}", status, body),
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<TextStream, LlmError> {
        let response = self.send_request(prompt, &options).await?;

        if !options.stream {
            let body = response
                .text()
                .await
                .map_err(|e| LlmError::generation(Provider::Anthropic, e.to_string()))?;
            let raw: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
                LlmError::generation(Provider::Anthropic, format!("malformed response: {}", e))
            })?;

            let content = raw
                .get("content")
                .and_then(|c| c.as_array())
                .and_then(|arr| arr.first())
                .and_then(|block| block.get("text"))
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string();

            return Ok(once_stream(content));
        }

        let (tx, rx) = mpsc::channel::<Result<String, LlmError>>(32);
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx
                            .send(Err(LlmError::generation(
                                Provider::Anthropic,
                                e.to_string(),
                            )))
                            .await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                for data in drain_sse_data(&mut buffer) {
                    let Ok(event) = serde_json::from_str::<serde_json::Value>(&data) else {
                        continue;
                    };
                    match event.get("type").and_then(|t| t.as_str()) {
                        // Only text deltas carry response fragments
                        Some("content_block_delta") => {
                            let text = event
                                .get("delta")
                                .and_then(|d| d.get("text"))
                                .and_then(|t| t.as_str());
                            if let Some(text) = text {
                                if !text.is_empty()
                                    && tx.send(Ok(text.to_string())).await.is_err()
                                {
                                    return;
                                }
                            }
                        }
                        Some("error") => {
                            let message = event
                                .get("error")
                                .and_then(|e| e.get("message"))
                                .and_then(|m| m.as_str())
                                .unwrap_or("stream error");
                            let _ = tx
                                .send(Err(LlmError::generation(Provider::Anthropic, message)))
                                .await;
                            return;
                        }
                        _ => {}
                    }
                }
            }
            debug!("anthropic stream complete");
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_round_trip() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!(
            "anthropic".parse::<Provider>().unwrap(),
            Provider::Anthropic
        );
        assert!("gemini".parse::<Provider>().is_err());
        assert_eq!(Provider::OpenAi.to_string(), "openai");
    }

    #[test]
    fn test_provider_serde_names() {
        assert_eq!(
            serde_json::to_string(&Provider::OpenAi).unwrap(),
            "\"openai\""
        );
        let p: Provider = serde_json::from_str("\"anthropic\"").unwrap();
        assert_eq!(p, Provider::Anthropic);
    }

    #[test]
    fn test_drain_sse_data_complete_events() {
        let mut buffer =
            String::from("data: {\"a\":1}\n\ndata: {\"b\":2}\n\ndata: [DONE]\n\n");
        let payloads = drain_sse_data(&mut buffer);
        assert_eq!(payloads, vec!["{\"a\":1}", "{\"b\":2}", "[DONE]"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_sse_data_partial_event_kept() {
        let mut buffer = String::from("data: {\"a\":1}\n\ndata: {\"partial\"");
        let payloads = drain_sse_data(&mut buffer);
        assert_eq!(payloads, vec!["{\"a\":1}"]);
        assert_eq!(buffer, "data: {\"partial\"");
    }

    #[test]
    fn test_drain_sse_data_multiline_event() {
        let mut buffer = String::from("event: content_block_delta\ndata: {\"x\":1}\n\n");
        let payloads = drain_sse_data(&mut buffer);
        assert_eq!(payloads, vec!["{\"x\":1}"]);
    }

    #[test]
    fn test_openai_request_serialization() {
        let request = OpenAiRequest {
            model: "gpt-4",
            messages: vec![ChatTurn {
                role: "user",
                content: "hello",
            }],
            temperature: 0.7,
            max_tokens: None,
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["messages"][0]["role"], "user");
        // max_tokens omitted when unset
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_anthropic_request_defaults_max_tokens() {
        let request = AnthropicRequest {
            model: "claude-3-opus-20240229",
            max_tokens: ANTHROPIC_DEFAULT_MAX_TOKENS,
            messages: vec![ChatTurn {
                role: "user",
                content: "hi",
            }],
            temperature: 0.7,
            stream: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["max_tokens"], 4096);
        assert_eq!(json["stream"], true);
    }

    #[tokio::test]
    async fn test_once_stream_yields_single_fragment() {
        let mut s = once_stream("full response".to_string());
        let first = s.next().await.unwrap().unwrap();
        assert_eq!(first, "full response");
        assert!(s.next().await.is_none());
    }
}
