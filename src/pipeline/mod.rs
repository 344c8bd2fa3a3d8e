//! Generation Pipeline
//!
//! Drives one request through three dependent completion stages:
//!
//! ```text
//! Idle → Started → Stage(Explanation) → Stage(Mapping) → Stage(Diagram) → Complete
//!           └────────────┴──────────────────┴────────────────┴──→ Error
//! ```
//!
//! Each stage's payload is built from the previous stage's fully accumulated
//! text. Fragments are forwarded as chunk events the moment they arrive.
//! Any failure ends the run with exactly one `error` event; nothing is
//! retried. If the event receiver is dropped, the run stops at its next
//! suspension point and the in-flight provider stream is dropped with it.

pub mod events;
pub mod stage;

pub use events::{EventSink, GenerationEvent};
pub use stage::{StageKind, StageOutput};

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::ai::budget::{CostEstimate, TokenBudgetGate};
use crate::ai::provider::SharedProvider;
use crate::ai::validation::{StageVerdict, extract_component_mapping, strip_code_fences};
use crate::config::GenerationConfig;
use crate::diagram::{DiagramArtifact, DiagramPostProcessor};
use crate::github::SharedSnapshotCache;
use crate::types::{
    Credential, DiagramError, GenerationRequest, Result, ValidationError, ValidationErrorKind,
};
use stage::StageInputs;

/// Where a run is, or where it ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Started,
    Stage(StageKind),
    Complete,
    Error,
    /// Receiver dropped; no terminal event was delivered
    Cancelled,
}

/// Pre-stream request checks: instruction length and reserved repositories
pub fn validate_request(request: &GenerationRequest, limits: &GenerationConfig) -> Result<()> {
    if request.instructions.chars().count() > limits.max_instructions_len {
        return Err(ValidationError::new(
            ValidationErrorKind::InstructionsTooLong,
            format!(
                "Instructions exceed maximum length of {} characters",
                limits.max_instructions_len
            ),
        )
        .into());
    }

    if limits.reserved_repos.iter().any(|r| *r == request.repo) {
        return Err(ValidationError::new(
            ValidationErrorKind::ReservedRepository,
            "Example repos cannot be regenerated",
        )
        .into());
    }

    if request.owner.trim().is_empty() || request.repo.trim().is_empty() {
        return Err(ValidationError::new(
            ValidationErrorKind::Format,
            "Repository owner and name are required",
        )
        .into());
    }

    Ok(())
}

pub struct GenerationPipeline {
    provider: SharedProvider,
    cache: SharedSnapshotCache,
    gate: TokenBudgetGate,
    post_processor: DiagramPostProcessor,
    limits: GenerationConfig,
}

impl GenerationPipeline {
    pub fn new(provider: SharedProvider, cache: SharedSnapshotCache) -> Self {
        Self {
            provider,
            cache,
            gate: TokenBudgetGate::default(),
            post_processor: DiagramPostProcessor::default(),
            limits: GenerationConfig::default(),
        }
    }

    pub fn with_post_processor(mut self, post_processor: DiagramPostProcessor) -> Self {
        self.post_processor = post_processor;
        self
    }

    pub fn with_limits(mut self, limits: GenerationConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn validate(&self, request: &GenerationRequest) -> Result<()> {
        validate_request(request, &self.limits)
    }

    pub fn cache(&self) -> &SharedSnapshotCache {
        &self.cache
    }

    pub fn provider(&self) -> &SharedProvider {
        &self.provider
    }

    /// Estimated cost of generating a diagram for a repository
    pub async fn estimate_cost(
        &self,
        owner: &str,
        repo: &str,
        credential: Option<&Credential>,
    ) -> Result<CostEstimate> {
        let snapshot = self.cache.get(owner, repo, credential).await?;
        let file_tree_tokens = self.provider.count_tokens(&snapshot.file_tree);
        let readme_tokens = self.provider.count_tokens(&snapshot.readme);

        let estimate = CostEstimate::from_tokens(file_tree_tokens, readme_tokens);
        debug!(
            "Cost estimate for {}/{}: tree={} readme={} -> {}",
            owner,
            repo,
            file_tree_tokens,
            readme_tokens,
            estimate.formatted()
        );
        Ok(estimate)
    }

    /// Run in a background task, returning the event receiver
    pub fn spawn(
        self: &Arc<Self>,
        request: GenerationRequest,
        capacity: usize,
    ) -> mpsc::Receiver<GenerationEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            pipeline.run(request, tx).await;
        });
        rx
    }

    /// Execute one run, emitting events into `tx`. Returns the final state.
    pub async fn run(
        &self,
        request: GenerationRequest,
        tx: mpsc::Sender<GenerationEvent>,
    ) -> PipelineState {
        let sink = EventSink::new(tx);
        let mut state = PipelineState::Idle;

        let result = self.execute(&request, &sink, &mut state).await;
        match result {
            Ok(artifact) => {
                info!(
                    "Generated diagram for {}/{} ({} click links)",
                    request.owner,
                    request.repo,
                    artifact.clicks.len()
                );
                PipelineState::Complete
            }
            Err(DiagramError::Cancelled(reason)) => {
                info!(
                    "Generation for {}/{} cancelled during {:?}: {}",
                    request.owner, request.repo, state, reason
                );
                PipelineState::Cancelled
            }
            Err(e) => {
                warn!(
                    "Generation for {}/{} failed during {:?}: {}",
                    request.owner, request.repo, state, e
                );
                if sink.send(GenerationEvent::error(e.to_string())).await.is_err() {
                    return PipelineState::Cancelled;
                }
                PipelineState::Error
            }
        }
    }

    async fn execute(
        &self,
        request: &GenerationRequest,
        sink: &EventSink,
        state: &mut PipelineState,
    ) -> Result<DiagramArtifact> {
        *state = PipelineState::Started;
        sink.send(GenerationEvent::started()).await?;

        let snapshot = self
            .cache
            .get(&request.owner, &request.repo, request.credential.as_ref())
            .await?;

        let token_count = self.provider.count_tokens(&snapshot.combined_content());
        debug!("{}/{}: {} tokens", request.owner, request.repo, token_count);
        self.gate
            .evaluate(token_count, request.has_user_key())
            .into_result(token_count)?;

        let mut inputs = StageInputs {
            request,
            snapshot: snapshot.as_ref(),
            explanation: "",
            mapping: "",
        };

        // Explanation
        *state = PipelineState::Stage(StageKind::Explanation);
        let output = self.run_stage(StageKind::Explanation, &inputs, sink).await?;
        let explanation = match StageVerdict::classify(output.into_text()) {
            StageVerdict::Usable(text) => text,
            StageVerdict::BadInstructions => return Err(DiagramError::UserInstructions),
        };
        inputs.explanation = &explanation;

        // Mapping
        *state = PipelineState::Stage(StageKind::Mapping);
        let output = self.run_stage(StageKind::Mapping, &inputs, sink).await?;
        let mapping = extract_component_mapping(output.full_text()).to_string();
        inputs.mapping = &mapping;

        // Diagram
        *state = PipelineState::Stage(StageKind::Diagram);
        let output = self.run_stage(StageKind::Diagram, &inputs, sink).await?;
        let raw = match StageVerdict::classify(strip_code_fences(output.full_text())) {
            StageVerdict::Usable(text) => text,
            StageVerdict::BadInstructions => return Err(DiagramError::UserInstructions),
        };

        let artifact = self.post_processor.process(
            raw,
            &request.owner,
            &request.repo,
            &snapshot.default_branch,
        );

        sink.send(GenerationEvent::Complete {
            diagram: artifact.diagram.clone(),
            explanation,
            mapping,
            clicks: artifact.clicks.clone(),
        })
        .await?;
        *state = PipelineState::Complete;

        Ok(artifact)
    }

    /// Stream one stage, forwarding each fragment before pulling the next
    async fn run_stage(
        &self,
        kind: StageKind,
        inputs: &StageInputs<'_>,
        sink: &EventSink,
    ) -> Result<StageOutput> {
        sink.send(GenerationEvent::sent(kind, self.provider.model()))
            .await?;

        let system_prompt = kind.system_prompt(inputs.request.has_instructions());
        let payload = inputs.payload(kind);

        sink.send(GenerationEvent::begin(kind)).await?;

        let opened = tokio::select! {
            opened = self.provider.stream_completion(
                &system_prompt,
                &payload,
                inputs.request.api_key.as_ref(),
            ) => opened,
            _ = sink.closed() => return Err(cancelled(kind)),
        };
        let mut stream = opened?;

        let mut output = StageOutput::new(kind);
        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                _ = sink.closed() => return Err(cancelled(kind)),
            };

            let Some(fragment) = next else {
                break;
            };
            let fragment = fragment?;
            output.push(&fragment);
            sink.send(GenerationEvent::chunk(kind, fragment)).await?;
        }

        debug!(
            "Stage {} finished: {} chunks, {} chars",
            kind,
            output.chunks().len(),
            output.full_text().len()
        );
        Ok(output)
    }
}

fn cancelled(kind: StageKind) -> DiagramError {
    DiagramError::Cancelled(format!("receiver dropped during {} stage", kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::prompt::PromptTemplates;
    use crate::ai::provider::fake::{Script, ScriptedProvider};
    use crate::github::RepositorySnapshotCache;
    use crate::github::fake::StaticRepositoryProvider;

    fn pipeline_with(provider: Arc<ScriptedProvider>) -> GenerationPipeline {
        let repos = Arc::new(StaticRepositoryProvider::new(&["src/main.rs", "src/api"], "# Demo"));
        let cache = Arc::new(RepositorySnapshotCache::new(repos, 10));
        GenerationPipeline::new(provider, cache)
    }

    async fn collect(pipeline: &GenerationPipeline, request: GenerationRequest) -> (PipelineState, Vec<GenerationEvent>) {
        let (tx, mut rx) = mpsc::channel(256);
        let state = pipeline.run(request, tx).await;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (state, events)
    }

    fn statuses(events: &[GenerationEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.status()).collect()
    }

    fn happy_scripts() -> Vec<Script> {
        vec![
            Script::Chunks(vec!["A web ", "service."]),
            Script::Chunks(vec!["<component_mapping>", "1. api: src/api", "</component_mapping>"]),
            Script::Chunks(vec![
                "```mermaid\nflowchart TD\n",
                "  A[Api]\n",
                "  click A \"src/api\"\n",
                "  click M \"src/main.rs#main\"\n```",
            ]),
        ]
    }

    #[tokio::test]
    async fn test_successful_run_event_order() {
        let provider = Arc::new(ScriptedProvider::new(happy_scripts()));
        let pipeline = pipeline_with(provider.clone());

        let (state, events) = collect(&pipeline, GenerationRequest::new("o", "r")).await;

        assert_eq!(state, PipelineState::Complete);
        assert_eq!(
            statuses(&events),
            vec![
                "started",
                "explanation_sent",
                "explanation",
                "explanation_chunk",
                "explanation_chunk",
                "mapping_sent",
                "mapping",
                "mapping_chunk",
                "mapping_chunk",
                "mapping_chunk",
                "diagram_sent",
                "diagram",
                "diagram_chunk",
                "diagram_chunk",
                "diagram_chunk",
                "diagram_chunk",
                "complete",
            ]
        );
        assert_eq!(provider.calls().len(), 3);

        let Some(GenerationEvent::Complete {
            diagram,
            explanation,
            mapping,
            clicks,
        }) = events.last()
        else {
            panic!("expected complete event");
        };
        assert_eq!(explanation, "A web service.");
        assert_eq!(mapping, "1. api: src/api");
        assert!(!diagram.contains("```"));
        assert!(diagram.contains(r#"click A "https://github.com/o/r/tree/main/src/api""#));
        assert!(diagram.contains(r#"click M "https://github.com/o/r/blob/main/src/main.rs""#));
        assert_eq!(clicks[1].path, "src/main.rs#main");
    }

    #[tokio::test]
    async fn test_chunks_forwarded_in_provider_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Script::Chunks(vec!["3", "1", "2", "1"]),
            Script::Chunks(vec![]),
            Script::Chunks(vec!["graph TD"]),
        ]));
        let pipeline = pipeline_with(provider);

        let (_, events) = collect(&pipeline, GenerationRequest::new("o", "r")).await;
        let chunks: Vec<&str> = events
            .iter()
            .filter(|e| matches!(e, GenerationEvent::ExplanationChunk { .. }))
            .filter_map(|e| e.chunk_text())
            .collect();
        assert_eq!(chunks, vec!["3", "1", "2", "1"]);
    }

    #[tokio::test]
    async fn test_stage_payloads_use_full_prior_text() {
        let provider = Arc::new(ScriptedProvider::new(happy_scripts()));
        let pipeline = pipeline_with(provider.clone());

        let request = GenerationRequest::new("o", "r").with_instructions("Focus on the API");
        collect(&pipeline, request).await;

        let calls = provider.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].system_prompt, StageKind::Explanation.system_prompt(true));
        assert_eq!(calls[1].system_prompt, PromptTemplates::mapping());
        assert_eq!(calls[2].system_prompt, StageKind::Diagram.system_prompt(true));
        assert_ne!(calls[0].system_prompt, PromptTemplates::explanation());
        assert_ne!(calls[2].system_prompt, PromptTemplates::diagram());

        assert!(calls[0].user_payload.contains("<instructions>\nFocus on the API\n</instructions>"));
        assert!(!calls[1].user_payload.contains("<instructions>"));
        assert!(calls[2].user_payload.contains("<instructions>\nFocus on the API\n</instructions>"));
        assert!(calls[0].user_payload.contains("<file_tree>\nsrc/main.rs\nsrc/api\n</file_tree>"));
        assert!(calls[1].user_payload.contains("<explanation>\nA web service.\n</explanation>"));
        assert!(calls[2]
            .user_payload
            .contains("<component_mapping>\n1. api: src/api\n</component_mapping>"));
        assert!(calls.iter().all(|c| !c.used_user_key));
    }

    #[tokio::test]
    async fn test_bad_instructions_stop_before_mapping() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Script::Chunks(vec!["...BAD_", "INSTRUCTIONS..."]),
            Script::Chunks(vec!["never"]),
        ]));
        let pipeline = pipeline_with(provider.clone());
        let request = GenerationRequest::new("o", "r").with_instructions("draw a cat");

        let (state, events) = collect(&pipeline, request).await;

        assert_eq!(state, PipelineState::Error);
        assert_eq!(provider.calls().len(), 1);
        assert_eq!(
            events.last(),
            Some(&GenerationEvent::error("Invalid or unclear instructions provided"))
        );
        assert!(!statuses(&events).contains(&"mapping_sent"));
    }

    #[tokio::test]
    async fn test_bad_instructions_in_diagram() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Script::Chunks(vec!["fine"]),
            Script::Chunks(vec!["<component_mapping></component_mapping>"]),
            Script::Chunks(vec!["```mermaid\nBAD_INSTRUCTIONS\n```"]),
        ]));
        let pipeline = pipeline_with(provider);

        let (state, events) = collect(&pipeline, GenerationRequest::new("o", "r")).await;
        assert_eq!(state, PipelineState::Error);
        assert!(matches!(events.last(), Some(GenerationEvent::Error { .. })));
        assert!(!statuses(&events).contains(&"complete"));
    }

    #[tokio::test]
    async fn test_provider_failure_mid_stream() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Script::Chunks(vec!["ok"]),
            Script::FailAfter(vec!["partial"]),
        ]));
        let pipeline = pipeline_with(provider.clone());

        let (state, events) = collect(&pipeline, GenerationRequest::new("o", "r")).await;

        assert_eq!(state, PipelineState::Error);
        assert_eq!(provider.calls().len(), 2);
        let error_count = events.iter().filter(|e| e.status() == "error").count();
        assert_eq!(error_count, 1);
        assert_eq!(statuses(&events).last(), Some(&"error"));
        assert!(statuses(&events).contains(&"mapping_chunk"));
    }

    #[tokio::test]
    async fn test_provider_refuses_to_open() {
        let provider = Arc::new(ScriptedProvider::new(vec![Script::Refuse]));
        let pipeline = pipeline_with(provider);

        let (state, events) = collect(&pipeline, GenerationRequest::new("o", "r")).await;
        assert_eq!(state, PipelineState::Error);
        let GenerationEvent::Error { error } = events.last().unwrap() else {
            panic!("expected error event");
        };
        assert!(error.contains("503"));
    }

    #[tokio::test]
    async fn test_gate_requires_user_key() {
        let provider = Arc::new(ScriptedProvider::new(happy_scripts()).with_token_count(60_000));
        let pipeline = pipeline_with(provider.clone());

        let (state, events) = collect(&pipeline, GenerationRequest::new("o", "r")).await;

        assert_eq!(state, PipelineState::Error);
        assert_eq!(statuses(&events), vec!["started", "error"]);
        assert!(provider.calls().is_empty());
        let GenerationEvent::Error { error } = &events[1] else {
            panic!("expected error event");
        };
        assert!(error.contains("Current size: 60000 tokens"));
    }

    #[tokio::test]
    async fn test_user_key_passes_gate_and_reaches_provider() {
        let provider = Arc::new(ScriptedProvider::new(happy_scripts()).with_token_count(60_000));
        let pipeline = pipeline_with(provider.clone());
        let request = GenerationRequest::new("o", "r").with_api_key(Some("sk-user".to_string()));

        let (state, _) = collect(&pipeline, request).await;

        assert_eq!(state, PipelineState::Complete);
        assert!(provider.calls().iter().all(|c| c.used_user_key));
    }

    #[tokio::test]
    async fn test_gate_ceiling_rejects_even_with_key() {
        let provider = Arc::new(ScriptedProvider::new(happy_scripts()).with_token_count(195_001));
        let pipeline = pipeline_with(provider.clone());
        let request = GenerationRequest::new("o", "r").with_api_key(Some("sk-user".to_string()));

        let (_, events) = collect(&pipeline, request).await;
        assert_eq!(statuses(&events), vec!["started", "error"]);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_repository_is_single_error() {
        let provider = Arc::new(ScriptedProvider::new(happy_scripts()));
        let cache = Arc::new(RepositorySnapshotCache::new(
            Arc::new(StaticRepositoryProvider::missing()),
            10,
        ));
        let pipeline = GenerationPipeline::new(provider.clone(), cache);

        let (state, events) = collect(&pipeline, GenerationRequest::new("o", "gone")).await;
        assert_eq!(state, PipelineState::Error);
        assert_eq!(statuses(&events), vec!["started", "error"]);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_receiver_cancels_run() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Script::Chunks(vec!["a"; 64]),
            Script::Chunks(vec!["never"]),
        ]));
        let pipeline = Arc::new(pipeline_with(provider.clone()));

        let (tx, mut rx) = mpsc::channel(1);
        let runner = {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.run(GenerationRequest::new("o", "r"), tx).await })
        };

        while let Some(event) = rx.recv().await {
            if event.status() == "explanation_chunk" {
                break;
            }
        }
        drop(rx);

        assert_eq!(runner.await.unwrap(), PipelineState::Cancelled);
        assert_eq!(provider.calls().len(), 1);
    }

    #[test]
    fn test_validate_request() {
        let limits = GenerationConfig::default();

        let ok = GenerationRequest::new("o", "r").with_instructions("x".repeat(1000));
        assert!(validate_request(&ok, &limits).is_ok());

        let long = GenerationRequest::new("o", "r").with_instructions("x".repeat(1001));
        let err = validate_request(&long, &limits).unwrap_err();
        assert_eq!(err.to_string(), "Instructions exceed maximum length of 1000 characters");

        let reserved = GenerationRequest::new("tiangolo", "fastapi");
        let err = validate_request(&reserved, &limits).unwrap_err();
        assert_eq!(err.to_string(), "Example repos cannot be regenerated");
        assert!(matches!(err, DiagramError::Validation(_)));
    }

    #[tokio::test]
    async fn test_estimate_cost() {
        let provider = Arc::new(ScriptedProvider::new(vec![]).with_token_count(1_000));
        let pipeline = pipeline_with(provider.clone());

        let estimate = pipeline.estimate_cost("o", "r", None).await.unwrap();
        // (2*1000 + 1000 + 3000) * 1.1e-6 + 8000 * 4.4e-6
        assert_eq!(estimate.formatted(), "$0.04 USD");
        assert!(provider.calls().is_empty());
    }
}
