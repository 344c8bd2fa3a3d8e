//! Prompt Construction
//!
//! System prompts for the three generation stages and the builder for the
//! tagged user payload each stage receives.
//!
//! The payload is a sequence of `<key>\nvalue\n</key>` sections in insertion
//! order. Empty values are skipped so optional inputs (instructions, an
//! empty mapping) do not produce hollow tags.

/// Ordered, tagged payload sent as the user message of a stage
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<(&'static str, String)>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tagged section; empty values are dropped
    pub fn section(mut self, tag: &'static str, value: &str) -> Self {
        if !value.is_empty() {
            self.sections.push((tag, value.to_string()));
        }
        self
    }

    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sections.iter().map(|(tag, _)| *tag)
    }

    pub fn build(&self) -> String {
        self.sections
            .iter()
            .map(|(tag, value)| format!("<{tag}>\n{value}\n</{tag}>"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// System prompt templates
pub struct PromptTemplates;

impl PromptTemplates {
    /// Stage 1: explain the repository from its file tree and README
    pub fn explanation() -> &'static str {
        EXPLANATION_PROMPT
    }

    /// Stage 2: map explained components to repository paths
    pub fn mapping() -> &'static str {
        MAPPING_PROMPT
    }

    /// Stage 3: produce the Mermaid diagram
    pub fn diagram() -> &'static str {
        DIAGRAM_PROMPT
    }

    /// Append the instructions addendum when the caller supplied instructions
    pub fn with_instructions(base: &str, has_instructions: bool) -> String {
        if has_instructions {
            format!("{}\n{}", base, ADDITIONAL_INSTRUCTIONS_PROMPT)
        } else {
            base.to_string()
        }
    }
}

const EXPLANATION_PROMPT: &str = r#"You are a principal software engineer explaining the architecture of an unfamiliar repository so that a diagram of it can be drawn.

You will receive the repository file tree in <file_tree>, its README in <readme>, and optionally caller instructions in <instructions>.

1. Identify the kind of project (web application, library, CLI, service, data pipeline, ...) and its main languages and frameworks.
2. Describe the major components, layers and services, and which directories or files implement them.
3. Describe how data and control flow between those components, including external systems.
4. Note deployment or infrastructure pieces visible in the tree.

Be specific to this repository. Put the complete explanation inside <explanation></explanation> tags."#;

const MAPPING_PROMPT: &str = r#"You map architectural components to concrete paths in a repository.

You will receive an architecture explanation in <explanation> and the repository file tree in <file_tree>.

For every component named in the explanation, give the file or directory path in the tree that best implements it. Use paths exactly as they appear in the file tree. Skip components with no clear counterpart.

Answer in this format and nothing else:
<component_mapping>
1. [Component name]: [path]
2. [Component name]: [path]
</component_mapping>"#;

const DIAGRAM_PROMPT: &str = r#"You turn an architecture explanation into a Mermaid.js flowchart.

You will receive the explanation in <explanation>, a component-to-path mapping in <component_mapping>, the file tree in <file_tree>, the README in <readme>, and optionally caller instructions in <instructions>.

Rules:
- Start with `flowchart TD` and draw the system vertically.
- Use subgraphs for layers or services and label every edge that carries meaning.
- For each node that has a mapped path, add a click directive of the form: click NodeId "path/from/mapping"
  Use the repository-relative path only; never a full URL.
- Quote node labels that contain special characters. Do not use the word "end" as a node id.
- Add classDef styles for component kinds and apply them.

Return only valid Mermaid code, without code fences or commentary."#;

const ADDITIONAL_INSTRUCTIONS_PROMPT: &str = r#"The caller supplied instructions in <instructions>. Follow them when they are relevant to explaining or diagramming this repository. If the instructions are unrelated, contradictory, or impossible to follow, respond with exactly "BAD_INSTRUCTIONS" and nothing else."#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::markers;

    #[test]
    fn test_builder_renders_tagged_sections_in_order() {
        let payload = PromptBuilder::new()
            .section("file_tree", "src/main.rs")
            .section("readme", "# Demo")
            .build();

        assert_eq!(
            payload,
            "<file_tree>\nsrc/main.rs\n</file_tree>\n\n<readme>\n# Demo\n</readme>"
        );
    }

    #[test]
    fn test_builder_skips_empty_sections() {
        let builder = PromptBuilder::new()
            .section("explanation", "text")
            .section("instructions", "");

        assert_eq!(builder.tags().collect::<Vec<_>>(), vec!["explanation"]);
    }

    #[test]
    fn test_instructions_addendum() {
        let base = PromptTemplates::explanation();
        assert_eq!(PromptTemplates::with_instructions(base, false), base);

        let extended = PromptTemplates::with_instructions(base, true);
        assert!(extended.starts_with(base));
        assert!(extended.contains(markers::BAD_INSTRUCTIONS));
    }

    #[test]
    fn test_mapping_prompt_names_markers() {
        assert!(PromptTemplates::mapping().contains(markers::MAPPING_OPEN));
        assert!(PromptTemplates::mapping().contains(markers::MAPPING_CLOSE));
        assert!(PromptTemplates::diagram().contains("click NodeId"));
    }
}
