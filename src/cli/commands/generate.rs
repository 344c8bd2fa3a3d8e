//! Generate Command
//!
//! Runs the full pipeline locally and renders events as they arrive.
//!
//! Usage:
//!   repodiagram generate <owner/repo> [--instructions TEXT] [--api-key KEY]
//!                        [--github-pat TOKEN] [--json]

use std::sync::Arc;
use tracing::debug;

use crate::cli::parse_repository;
use crate::cli::ui::Output;
use crate::config::Config;
use crate::pipeline::GenerationEvent;
use crate::server::build_pipeline;
use crate::types::{GenerationRequest, Result};

#[derive(Debug, Default)]
pub struct GenerateOptions {
    pub target: String,
    pub instructions: Option<String>,
    pub api_key: Option<String>,
    pub github_pat: Option<String>,
    /// Print raw `data:` frames instead of rendered output
    pub json: bool,
    pub quiet: bool,
}

/// Returns `false` when the run ended with an `error` event
pub async fn run(config: &Config, options: GenerateOptions) -> Result<bool> {
    let (owner, repo) = parse_repository(&options.target)?;
    let pipeline = Arc::new(build_pipeline(config)?);

    let request = GenerationRequest::new(owner, repo)
        .with_instructions(options.instructions.unwrap_or_default())
        .with_api_key(options.api_key)
        .with_credential(options.github_pat);
    pipeline.validate(&request)?;

    let output = Output::new().quiet(options.quiet);
    let mut events = pipeline.spawn(request, config.server.channel_capacity);
    let mut streamed_bytes = 0;

    while let Some(event) = events.recv().await {
        if options.json {
            print!("{}", event.to_sse_frame()?);
        } else {
            output.event(&event);
        }
        streamed_bytes += event.chunk_text().map_or(0, str::len);

        if event.is_terminal() {
            debug!("Run ended with {} after {} streamed bytes", event.status(), streamed_bytes);
            return Ok(matches!(event, GenerationEvent::Complete { .. }));
        }
    }

    Ok(false)
}
