//! Stage definitions
//!
//! The three generation stages and the text each one accumulates.

use serde::Serialize;

use crate::ai::prompt::{PromptBuilder, PromptTemplates};
use crate::types::{GenerationRequest, RepositorySnapshot};

/// Generation stage, ordered as executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Explanation,
    Mapping,
    Diagram,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [Self::Explanation, Self::Mapping, Self::Diagram];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explanation => "explanation",
            Self::Mapping => "mapping",
            Self::Diagram => "diagram",
        }
    }

    /// Status message sent before the provider call opens
    pub fn sent_message(&self, model: &str) -> String {
        match self {
            Self::Explanation => format!("Sending explanation request to {}...", model),
            Self::Mapping => format!("Sending component mapping request to {}...", model),
            Self::Diagram => format!("Sending diagram generation request to {}...", model),
        }
    }

    /// Status message sent when the stage starts streaming
    pub fn begin_message(&self) -> &'static str {
        match self {
            Self::Explanation => "Analyzing repository structure...",
            Self::Mapping => "Creating component mapping...",
            Self::Diagram => "Generating diagram...",
        }
    }

    /// System prompt; the mapping stage never gets the instructions addendum
    pub fn system_prompt(&self, has_instructions: bool) -> String {
        match self {
            Self::Explanation => {
                PromptTemplates::with_instructions(PromptTemplates::explanation(), has_instructions)
            }
            Self::Mapping => PromptTemplates::mapping().to_string(),
            Self::Diagram => {
                PromptTemplates::with_instructions(PromptTemplates::diagram(), has_instructions)
            }
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accumulated output of one stage.
///
/// `full_text` is always the concatenation of `chunks` in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput {
    kind: StageKind,
    full_text: String,
    chunks: Vec<String>,
}

impl StageOutput {
    pub fn new(kind: StageKind) -> Self {
        Self {
            kind,
            full_text: String::new(),
            chunks: Vec::new(),
        }
    }

    pub fn push(&mut self, chunk: &str) {
        self.full_text.push_str(chunk);
        self.chunks.push(chunk.to_string());
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn into_text(self) -> String {
        self.full_text
    }
}

/// Everything a stage payload may draw from
pub(crate) struct StageInputs<'a> {
    pub request: &'a GenerationRequest,
    pub snapshot: &'a RepositorySnapshot,
    pub explanation: &'a str,
    pub mapping: &'a str,
}

impl StageInputs<'_> {
    /// User payload for `kind`, built only from fully accumulated prior output
    pub fn payload(&self, kind: StageKind) -> String {
        let builder = PromptBuilder::new();
        let builder = match kind {
            StageKind::Explanation => builder
                .section("file_tree", &self.snapshot.file_tree)
                .section("readme", &self.snapshot.readme)
                .section("instructions", &self.request.instructions),
            StageKind::Mapping => builder
                .section("explanation", self.explanation)
                .section("file_tree", &self.snapshot.file_tree),
            StageKind::Diagram => builder
                .section("explanation", self.explanation)
                .section("component_mapping", self.mapping)
                .section("file_tree", &self.snapshot.file_tree)
                .section("readme", &self.snapshot.readme)
                .section("instructions", &self.request.instructions),
        };
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::markers;
    use chrono::Utc;

    fn snapshot() -> RepositorySnapshot {
        RepositorySnapshot {
            owner: "o".into(),
            repo: "r".into(),
            default_branch: "main".into(),
            file_tree: "src/lib.rs".into(),
            readme: "# R".into(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_stage_order() {
        assert!(StageKind::Explanation < StageKind::Mapping);
        assert!(StageKind::Mapping < StageKind::Diagram);
        let mut shuffled = vec![StageKind::Diagram, StageKind::Explanation, StageKind::Mapping];
        shuffled.sort();
        assert_eq!(shuffled, StageKind::ALL.to_vec());
    }

    #[test]
    fn test_output_accumulates_in_order() {
        let mut output = StageOutput::new(StageKind::Mapping);
        for chunk in ["a", "", "bc", "d"] {
            output.push(chunk);
        }
        assert_eq!(output.full_text(), "abcd");
        assert_eq!(output.chunks().concat(), output.full_text());
        assert_eq!(output.chunks().len(), 4);
    }

    #[test]
    fn test_mapping_prompt_ignores_instructions() {
        let prompt = StageKind::Mapping.system_prompt(true);
        assert!(!prompt.contains(markers::BAD_INSTRUCTIONS));
        assert!(StageKind::Explanation.system_prompt(true).contains(markers::BAD_INSTRUCTIONS));
        assert!(StageKind::Diagram.system_prompt(true).contains(markers::BAD_INSTRUCTIONS));
        assert!(!StageKind::Diagram.system_prompt(false).contains(markers::BAD_INSTRUCTIONS));
    }

    #[test]
    fn test_payload_sections() {
        let request = GenerationRequest::new("o", "r").with_instructions("focus on storage");
        let snapshot = snapshot();
        let inputs = StageInputs {
            request: &request,
            snapshot: &snapshot,
            explanation: "It is a library.",
            mapping: "",
        };

        let explanation = inputs.payload(StageKind::Explanation);
        assert!(explanation.starts_with("<file_tree>\nsrc/lib.rs\n</file_tree>"));
        assert!(explanation.ends_with("<instructions>\nfocus on storage\n</instructions>"));

        let mapping = inputs.payload(StageKind::Mapping);
        assert_eq!(
            mapping,
            "<explanation>\nIt is a library.\n</explanation>\n\n<file_tree>\nsrc/lib.rs\n</file_tree>"
        );

        // empty mapping extract is omitted
        let diagram = inputs.payload(StageKind::Diagram);
        assert!(!diagram.contains("<component_mapping>"));
        assert!(diagram.contains("<readme>\n# R\n</readme>"));
    }
}
