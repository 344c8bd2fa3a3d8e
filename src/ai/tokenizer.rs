//! Token Counting
//!
//! Token counts drive the admission gate and the cost estimate, so they are
//! computed with the same BPE vocabulary the completion model uses
//! (`o200k_base`). If the vocabulary cannot be loaded the counter degrades to
//! a code-aware heuristic rather than failing the request.

use std::sync::Arc;

use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

/// Token counter shared by providers
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Option<Arc<CoreBPE>>,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("exact", &self.is_exact())
            .finish()
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter {
    pub fn new() -> Self {
        let bpe = match tiktoken_rs::o200k_base() {
            Ok(bpe) => Some(Arc::new(bpe)),
            Err(e) => {
                warn!("Failed to load o200k_base vocabulary, estimating instead: {}", e);
                None
            }
        };

        Self { bpe }
    }

    #[cfg(test)]
    fn estimating() -> Self {
        Self { bpe: None }
    }

    /// Whether counts come from the real vocabulary
    pub fn is_exact(&self) -> bool {
        self.bpe.is_some()
    }

    /// Count tokens for a string
    pub fn count(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => {
                let tokens = bpe.encode_with_special_tokens(text).len();
                debug!("Counted {} tokens over {} bytes", tokens, text.len());
                tokens
            }
            None => count_code_aware(text),
        }
    }
}

/// Code-aware counting: punctuation and operators are individual tokens,
/// words are split roughly every four characters.
fn count_code_aware(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let mut tokens = 0;
    let mut current_word_len = 0usize;

    for ch in text.chars() {
        match ch {
            '(' | ')' | '{' | '}' | '[' | ']' | ';' | ':' | ',' | '.' | '+' | '-' | '*' | '/'
            | '=' | '<' | '>' | '!' | '&' | '|' | '@' | '#' | '$' | '%' | '^' | '~' | '?'
            | '\\' | '"' | '\'' => {
                tokens += estimate_word_tokens(current_word_len);
                current_word_len = 0;
                tokens += 1;
            }
            c if c.is_whitespace() => {
                tokens += estimate_word_tokens(current_word_len);
                current_word_len = 0;
            }
            c => current_word_len += c.len_utf8(),
        }
    }
    tokens += estimate_word_tokens(current_word_len);

    tokens.max(1)
}

fn estimate_word_tokens(len: usize) -> usize {
    match len {
        0 => 0,
        1..=4 => 1,
        5..=8 => 2,
        _ => len.div_ceil(4),
    }
}
