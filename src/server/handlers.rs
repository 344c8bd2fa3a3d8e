//! Request handlers

use axum::{
    Json,
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::AppState;
use super::error::{ApiError, ApiJson, ApiResult};
use crate::types::{Credential, GenerationRequest};

#[derive(Debug, Deserialize)]
pub struct CostRequest {
    pub username: String,
    pub repo: String,
    #[serde(default)]
    pub github_pat: Option<String>,
}

#[derive(Deserialize)]
pub struct StreamRequest {
    pub username: String,
    pub repo: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub github_pat: Option<String>,
}

impl std::fmt::Debug for StreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRequest")
            .field("username", &self.username)
            .field("repo", &self.repo)
            .field("instructions_len", &self.instructions.len())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("github_pat", &self.github_pat.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl From<StreamRequest> for GenerationRequest {
    fn from(body: StreamRequest) -> Self {
        GenerationRequest::new(body.username, body.repo)
            .with_instructions(body.instructions)
            .with_api_key(body.api_key)
            .with_credential(body.github_pat)
    }
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let stats = state.pipeline.cache().stats();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "model": state.pipeline.provider().model(),
        "cache": {
            "entries": state.pipeline.cache().len(),
            "hits": stats.hits,
            "misses": stats.misses,
            "evictions": stats.evictions,
            "hit_rate": stats.hit_rate(),
        },
    }))
}

/// `POST /generate/cost`
pub async fn cost(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CostRequest>,
) -> ApiResult<Json<Value>> {
    let credential = Credential::from_optional(body.github_pat);
    let estimate = state
        .pipeline
        .estimate_cost(&body.username, &body.repo, credential.as_ref())
        .await
        .map_err(ApiError::Failed)?;

    info!(
        "Cost for {}/{}: {}",
        body.username,
        body.repo,
        estimate.formatted()
    );
    Ok(Json(json!({ "cost": estimate.formatted() })))
}

/// `POST /generate/stream`
pub async fn stream(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<StreamRequest>,
) -> ApiResult<Response> {
    debug!("Stream request: {:?}", body);
    let request = GenerationRequest::from(body);
    state.pipeline.validate(&request).map_err(ApiError::Rejected)?;

    info!("Starting generation for {}/{}", request.owner, request.repo);
    let events = state.pipeline.spawn(request, state.channel_capacity);

    let frames = futures::stream::unfold(events, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    })
    .map(|event| event.to_sse_frame());

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}
