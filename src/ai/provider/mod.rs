//! Completion Provider Abstraction
//!
//! Defines the `CompletionProvider` trait: a streaming text-completion
//! service plus its tokenizer. A stage opens one stream per call; the stream
//! is lazy, finite and cannot be restarted once consumed.
//!
//! ## Modules
//!
//! - `openrouter`: OpenAI-compatible chat completions over server-sent events

mod openrouter;

pub use openrouter::{OpenRouterProvider, SseFrame, parse_sse_line};

use async_trait::async_trait;
use futures::Stream;
use secrecy::SecretString;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::types::{DiagramError, Result};

/// Text fragments as the provider produces them
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Shared provider type for concurrent access across pipeline runs.
pub type SharedProvider = Arc<dyn CompletionProvider>;

/// Streaming completion service
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Open a streaming completion.
    ///
    /// Errors raised before the first fragment (transport failure,
    /// non-success status) are returned directly; errors after that arrive
    /// as an `Err` item and end the stream.
    async fn stream_completion(
        &self,
        system_prompt: &str,
        user_payload: &str,
        api_key: Option<&SecretString>,
    ) -> Result<TextStream>;

    /// Count tokens with the model's tokenizer
    fn count_tokens(&self, text: &str) -> usize;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;
}

/// Create a shared provider from configuration
pub fn create_provider(config: &LlmConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "openrouter" | "openai" => Ok(Arc::new(OpenRouterProvider::new(config)?)),
        other => Err(DiagramError::Config(format!(
            "Unknown provider: {}. Supported: openrouter, openai",
            other
        ))),
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-process provider that replays scripted fragments per call.

    use super::*;
    use crate::types::{ErrorCategory, LlmError};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// What one `stream_completion` call produces
    #[derive(Debug, Clone)]
    pub enum Script {
        Chunks(Vec<&'static str>),
        /// Emit these chunks, then fail mid-stream
        FailAfter(Vec<&'static str>),
        /// Fail before streaming starts
        Refuse,
    }

    /// A recorded call
    #[derive(Debug, Clone)]
    pub struct Call {
        pub system_prompt: String,
        pub user_payload: String,
        pub used_user_key: bool,
    }

    pub struct ScriptedProvider {
        scripts: Mutex<VecDeque<Script>>,
        calls: Mutex<Vec<Call>>,
        tokens_per_char: usize,
        fixed_tokens: Option<usize>,
    }

    impl ScriptedProvider {
        pub fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                calls: Mutex::new(Vec::new()),
                tokens_per_char: 1,
                fixed_tokens: None,
            }
        }

        /// Report this token count for every input
        pub fn with_token_count(mut self, tokens: usize) -> Self {
            self.fixed_tokens = Some(tokens);
            self
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn stream_completion(
            &self,
            system_prompt: &str,
            user_payload: &str,
            api_key: Option<&SecretString>,
        ) -> Result<TextStream> {
            self.calls.lock().unwrap().push(Call {
                system_prompt: system_prompt.to_string(),
                user_payload: user_payload.to_string(),
                used_user_key: api_key.is_some(),
            });

            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Script::Chunks(Vec::new()));

            let items: Vec<Result<String>> = match script {
                Script::Chunks(chunks) => chunks.into_iter().map(|c| Ok(c.to_string())).collect(),
                Script::FailAfter(chunks) => chunks
                    .into_iter()
                    .map(|c| Ok(c.to_string()))
                    .chain(std::iter::once(Err(DiagramError::Llm(LlmError::with_provider(
                        ErrorCategory::ParseError,
                        "malformed stream frame",
                        "scripted",
                    )))))
                    .collect(),
                Script::Refuse => {
                    return Err(DiagramError::Llm(LlmError::from_http_status(
                        503,
                        "upstream down",
                        "scripted",
                    )));
                }
            };

            Ok(Box::pin(futures::stream::iter(items)))
        }

        fn count_tokens(&self, text: &str) -> usize {
            self.fixed_tokens
                .unwrap_or(text.chars().count() * self.tokens_per_char)
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-model"
        }
    }
}
