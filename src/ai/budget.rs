//! Token Budget Gate
//!
//! Admission control evaluated once per run, before the first completion
//! call. The gate is a pure function of the token count and whether the
//! caller brought their own key:
//!
//! | tokens                 | own key | verdict          |
//! |------------------------|---------|------------------|
//! | > 195 000              | any     | `Reject`         |
//! | 50 001 ..= 194 999     | no      | `RequireUserKey` |
//! | anything else          | any     | `Proceed`        |
//!
//! Both comparisons are strict, so exactly 50 000 and exactly 195 000 tokens
//! are admitted without a key.
//!
//! Also hosts the fixed linear cost estimate reported by the cost endpoint.

use serde::Serialize;

use crate::constants::budget::{CONTEXT_TOKEN_CEILING, FREE_TIER_TOKEN_LIMIT, MODEL_CONTEXT_TOKENS};
use crate::constants::cost;
use crate::types::DiagramError;

/// Gate verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Proceed,
    RequireUserKey(String),
    Reject(String),
}

impl Admission {
    /// Convert a blocking verdict into the matching error
    pub fn into_result(self, tokens: usize) -> Result<(), DiagramError> {
        match self {
            Self::Proceed => Ok(()),
            Self::RequireUserKey(message) => Err(DiagramError::BudgetRequiresKey { tokens, message }),
            Self::Reject(message) => Err(DiagramError::BudgetRejected { tokens, message }),
        }
    }
}

/// Token budget gate with the service thresholds
#[derive(Debug, Clone, Copy)]
pub struct TokenBudgetGate {
    free_limit: usize,
    ceiling: usize,
}

impl Default for TokenBudgetGate {
    fn default() -> Self {
        Self {
            free_limit: FREE_TIER_TOKEN_LIMIT,
            ceiling: CONTEXT_TOKEN_CEILING,
        }
    }
}

impl TokenBudgetGate {
    pub fn evaluate(&self, token_count: usize, has_user_key: bool) -> Admission {
        if token_count > self.ceiling {
            return Admission::Reject(format!(
                "Repository is too large (>{}k tokens) for analysis. The model's max context length is {}k tokens. Current size: {} tokens.",
                self.ceiling / 1000,
                MODEL_CONTEXT_TOKENS / 1000,
                token_count
            ));
        }

        if token_count > self.free_limit && token_count < self.ceiling && !has_user_key {
            return Admission::RequireUserKey(format!(
                "File tree and README combined exceeds token limit ({}). Current size: {} tokens. This GitHub repository is too large for my wallet, but you can continue by providing your own OpenAI API key.",
                format_thousands(self.free_limit),
                token_count
            ));
        }

        Admission::Proceed
    }
}

/// Shorthand for `TokenBudgetGate::default().evaluate(..)`
pub fn evaluate(token_count: usize, has_user_key: bool) -> Admission {
    TokenBudgetGate::default().evaluate(token_count, has_user_key)
}

fn format_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// =============================================================================
// Cost Estimate
// =============================================================================

/// Estimated generation cost for one repository
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostEstimate {
    pub file_tree_tokens: usize,
    pub readme_tokens: usize,
    pub usd: f64,
}

impl CostEstimate {
    /// The file tree is sent twice (explanation and mapping stages), the README
    /// once, plus a fixed prompt overhead; output length is assumed constant.
    pub fn from_tokens(file_tree_tokens: usize, readme_tokens: usize) -> Self {
        let input_tokens = file_tree_tokens * 2 + readme_tokens + cost::PROMPT_OVERHEAD_TOKENS;
        let input_cost = input_tokens as f64 * cost::INPUT_PRICE_PER_TOKEN;
        let output_cost = cost::ESTIMATED_OUTPUT_TOKENS as f64 * cost::OUTPUT_PRICE_PER_TOKEN;

        Self {
            file_tree_tokens,
            readme_tokens,
            usd: input_cost + output_cost,
        }
    }

    /// Currency string, e.g. `$0.04 USD`
    pub fn formatted(&self) -> String {
        format!("${:.2} USD", self.usd)
    }
}
