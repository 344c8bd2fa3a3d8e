//! AI Integration Layer
//!
//! Completion provider abstraction, token counting, admission control,
//! stage prompts and output classification.

pub mod budget;
pub mod prompt;
pub mod provider;
pub mod tokenizer;
pub mod validation;

pub use budget::{Admission, CostEstimate, TokenBudgetGate};
pub use prompt::{PromptBuilder, PromptTemplates};
pub use provider::{
    CompletionProvider, OpenRouterProvider, SharedProvider, TextStream, create_provider,
};
pub use tokenizer::TokenCounter;
pub use validation::{StageVerdict, extract_component_mapping, strip_code_fences};
