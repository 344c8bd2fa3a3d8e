//! OpenRouter Provider
//!
//! Streaming chat completions against OpenRouter or any OpenAI-compatible
//! endpoint. The response body is read line by line as server-sent events;
//! each `data:` frame carries a JSON chunk whose `choices[0].delta.content`
//! is yielded as one text fragment. `data: [DONE]` ends the stream.

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

use super::{CompletionProvider, TextStream};
use crate::ai::tokenizer::TokenCounter;
use crate::config::LlmConfig;
use crate::types::{DiagramError, ErrorCategory, LlmError, Result};

const PROVIDER_NAME: &str = "openrouter";

/// OpenRouter provider with secure API key handling
pub struct OpenRouterProvider {
    /// Service key; a caller-supplied key takes precedence per request
    api_key: Option<SecretString>,
    api_base: String,
    model: String,
    max_completion_tokens: usize,
    referer: String,
    title: String,
    client: reqwest::Client,
    counter: TokenCounter,
}

impl std::fmt::Debug for OpenRouterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterProvider")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_completion_tokens", &self.max_completion_tokens)
            .finish()
    }
}

impl OpenRouterProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if config.api_key.is_none() {
            warn!("No completion API key configured; only requests with their own key will succeed");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DiagramError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: config.api_key.clone().map(SecretString::from),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_completion_tokens: config.max_completion_tokens,
            referer: config.referer.clone(),
            title: config.title.clone(),
            client,
            counter: TokenCounter::default(),
        })
    }

    fn build_request(&self, system_prompt: &str, user_payload: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_payload.to_string(),
                },
            ],
            max_completion_tokens: self.max_completion_tokens,
            stream: true,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    async fn stream_completion(
        &self,
        system_prompt: &str,
        user_payload: &str,
        api_key: Option<&SecretString>,
    ) -> Result<TextStream> {
        let key = api_key.or(self.api_key.as_ref()).ok_or_else(|| {
            DiagramError::Llm(LlmError::with_provider(
                ErrorCategory::Auth,
                "No API key available. Set OPENROUTER_API_KEY or provide your own key",
                PROVIDER_NAME,
            ))
        })?;

        info!(
            "Streaming completion from {} (model: {}, key: {})",
            PROVIDER_NAME,
            self.model,
            if api_key.is_some() { "caller" } else { "service" }
        );

        let request = self.build_request(system_prompt, user_payload);
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", key.expose_secret()))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                DiagramError::Llm(LlmError::with_provider(
                    ErrorCategory::Network,
                    format!("Failed to connect to completion API: {}", e),
                    PROVIDER_NAME,
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Completion API error ({}): {}", status, body);
            return Err(DiagramError::Llm(LlmError::from_http_status(
                status.as_u16(),
                &body,
                PROVIDER_NAME,
            )));
        }

        let byte_stream = response.bytes_stream().map_err(std::io::Error::other);
        let lines = BufReader::new(StreamReader::new(byte_stream)).lines();

        let fragments = futures::stream::try_unfold(lines, |mut lines| async move {
            loop {
                let line = lines.next_line().await.map_err(|e| {
                    DiagramError::Llm(LlmError::with_provider(
                        ErrorCategory::Network,
                        format!("Stream read error: {}", e),
                        PROVIDER_NAME,
                    ))
                })?;

                let Some(line) = line else {
                    debug!("Completion stream closed without [DONE]");
                    return Ok(None);
                };

                match parse_sse_line(&line)? {
                    SseFrame::Content(text) => return Ok(Some((text, lines))),
                    SseFrame::Done => return Ok(None),
                    SseFrame::Skip => continue,
                }
            }
        });

        Ok(fragments.boxed())
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// =============================================================================
// SSE Frame Parsing
// =============================================================================

/// One parsed line of the completion event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A non-empty text fragment
    Content(String),
    /// End-of-stream marker
    Done,
    /// Blank line, comment, keep-alive or a chunk without text
    Skip,
}

/// Parse one event-stream line.
///
/// A `data:` frame whose payload is not valid JSON, or that carries an
/// `error` object, is a provider failure.
pub fn parse_sse_line(line: &str) -> Result<SseFrame> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Ok(SseFrame::Skip);
    }

    let Some(data) = line.strip_prefix("data:") else {
        // event:, id:, retry: fields carry nothing we use
        return Ok(SseFrame::Skip);
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        return Ok(SseFrame::Done);
    }

    let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| {
        DiagramError::Llm(LlmError::with_provider(
            ErrorCategory::ParseError,
            format!("Malformed stream frame ({}): {}", e, data),
            PROVIDER_NAME,
        ))
    })?;

    if let Some(error) = chunk.error {
        let category = error
            .code
            .and_then(|c| u16::try_from(c).ok())
            .map(ErrorCategory::from_http_status)
            .unwrap_or(ErrorCategory::Unknown);
        return Err(DiagramError::Llm(LlmError::with_provider(
            category,
            error.message,
            PROVIDER_NAME,
        )));
    }

    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty());

    Ok(match content {
        Some(text) => SseFrame::Content(text),
        None => SseFrame::Skip,
    })
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_completion_tokens: usize,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}
