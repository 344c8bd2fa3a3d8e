//! repodiagram - Architecture Diagrams for GitHub Repositories
//!
//! Turns a repository's file listing and README into a Mermaid architecture
//! diagram by driving an LLM through three dependent streaming stages, and
//! streams partial results to the caller as they are produced.
//!
//! ## Pipeline
//!
//! 1. **Snapshot**: default branch, filtered file tree and README, fetched
//!    once per (owner, repo, credential) and kept in a bounded LRU cache
//! 2. **Admission**: a token budget gate decides whether the run may proceed
//!    on the service key, needs the caller's own key, or is too large
//! 3. **Explanation → Mapping → Diagram**: three streaming completions, each
//!    fed the previous stage's full output
//! 4. **Post-processing**: `click` directives become absolute GitHub links
//!
//! ## Quick Start
//!
//! ```ignore
//! use repodiagram::{ConfigLoader, GenerationRequest};
//! use repodiagram::server::build_pipeline;
//!
//! let config = ConfigLoader::load()?;
//! let pipeline = Arc::new(build_pipeline(&config)?);
//! let mut events = pipeline.spawn(GenerationRequest::new("tokio-rs", "axum"), 64);
//! while let Some(event) = events.recv().await {
//!     print!("{}", event.to_sse_frame()?);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: completion provider, tokenizer, budget gate, prompts
//! - [`github`]: repository provider and snapshot cache
//! - [`pipeline`]: stage orchestration and the event protocol
//! - [`diagram`]: click-directive rewriting
//! - [`server`]: axum HTTP surface
//! - [`config`]: layered configuration

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod diagram;
pub mod github;
pub mod pipeline;
pub mod server;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{DiagramError, ErrorCategory, Result};

// Domain Types
pub use types::{Credential, GenerationRequest, RepositorySnapshot};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{GenerationEvent, GenerationPipeline, PipelineState, StageKind};

pub use ai::{
    Admission, CompletionProvider, CostEstimate, OpenRouterProvider, TokenBudgetGate,
    create_provider,
};
pub use diagram::{ClickDirective, DiagramPostProcessor, rewrite};
pub use github::{GitHubClient, RepositoryProvider, RepositorySnapshotCache};
