//! Stage Output Validation
//!
//! Completion output is free text. Control decisions the model signals in
//! that text are classified here once, so the pipeline works with tagged
//! values instead of re-scanning strings.

use crate::constants::markers;

/// Classification of a finished stage's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageVerdict {
    /// Text is usable by the next stage
    Usable(String),
    /// The model flagged the caller's instructions as unusable
    BadInstructions,
}

impl StageVerdict {
    /// Scan for the bad-instructions sentinel anywhere in the text
    pub fn classify(text: String) -> Self {
        if text.contains(markers::BAD_INSTRUCTIONS) {
            Self::BadInstructions
        } else {
            Self::Usable(text)
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Usable(_))
    }
}

/// Span strictly between the first `<component_mapping>` and the first
/// `</component_mapping>`.
///
/// Returns an empty string when either marker is missing or the closing
/// marker starts before the opening marker ends.
pub fn extract_component_mapping(text: &str) -> &str {
    let Some(open) = text.find(markers::MAPPING_OPEN) else {
        return "";
    };
    let Some(close) = text.find(markers::MAPPING_CLOSE) else {
        return "";
    };

    let start = open + markers::MAPPING_OPEN.len();
    if close < start {
        return "";
    }
    &text[start..close]
}

/// Remove every "```mermaid" and then every remaining "```", wherever they occur
pub fn strip_code_fences(text: &str) -> String {
    text.replace(markers::MERMAID_FENCE, "")
        .replace(markers::FENCE, "")
}
