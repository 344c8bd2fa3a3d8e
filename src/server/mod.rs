//! HTTP Server
//!
//! Axum router exposing the cost and streaming-generation endpoints.
//!
//! | route               | method | response                          |
//! |---------------------|--------|-----------------------------------|
//! | `/health`           | GET    | JSON status                       |
//! | `/generate/cost`    | POST   | `{"cost": "$0.12 USD"}`           |
//! | `/generate/stream`  | POST   | `text/event-stream` of events     |

mod error;
mod handlers;

pub use error::{ApiError, ApiJson, ApiResult};

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::ai::provider::create_provider;
use crate::config::{Config, ServerConfig};
use crate::diagram::DiagramPostProcessor;
use crate::github::{GitHubClient, RepositorySnapshotCache};
use crate::pipeline::GenerationPipeline;
use crate::types::{DiagramError, Result};

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<GenerationPipeline>,
    pub channel_capacity: usize,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(pipeline: Arc<GenerationPipeline>, channel_capacity: usize) -> Self {
        Self {
            pipeline,
            channel_capacity,
            started_at: Instant::now(),
        }
    }

    /// Wire up GitHub client, snapshot cache, provider and pipeline
    pub fn from_config(config: &Config) -> Result<Self> {
        let pipeline = build_pipeline(config)?;
        Ok(Self::new(Arc::new(pipeline), config.server.channel_capacity))
    }
}

/// Build a pipeline from configuration
pub fn build_pipeline(config: &Config) -> Result<GenerationPipeline> {
    let github = Arc::new(GitHubClient::new(&config.github)?);
    let cache = Arc::new(RepositorySnapshotCache::new(github, config.cache.capacity));
    let provider = create_provider(&config.llm)?;

    Ok(GenerationPipeline::new(provider, cache)
        .with_post_processor(DiagramPostProcessor::new(&config.github.web_host))
        .with_limits(config.generation.clone()))
}

pub fn router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/generate/cost", post(handlers::cost))
        .route("/generate/stream", post(handlers::stream))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::permissive().allow_origin(AllowOrigin::list(allowed))
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: &Config, bind: Option<&str>) -> Result<()> {
    let addr = bind.unwrap_or(&config.server.bind);
    let state = AppState::from_config(config)?;
    let app = router(state, &config.server);

    let listener = TcpListener::bind(addr).await?;
    info!(
        "Listening on http://{} (model: {})",
        listener.local_addr()?,
        config.llm.model
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(DiagramError::Io)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}
