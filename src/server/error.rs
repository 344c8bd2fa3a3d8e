//! HTTP error responses
//!
//! Every failure the API reports before a stream starts is a JSON object
//! with a human-readable `error` string, including bodies axum cannot parse.

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::types::{DiagramError, ValidationError, ValidationErrorKind};

/// JSON body extractor whose rejection is an `ApiError`
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, Error)]
pub enum ApiError {
    /// Request refused before any upstream work
    #[error("{0}")]
    Rejected(DiagramError),

    /// Upstream failure reported in-band; clients read `error` from a 200 body
    #[error("{0}")]
    Failed(DiagramError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Rejected(_) => StatusCode::BAD_REQUEST,
            ApiError::Failed(_) => StatusCode::OK,
        }
    }

    fn kind(&self) -> &'static str {
        let err = match self {
            ApiError::Rejected(err) | ApiError::Failed(err) => err,
        };
        match err {
            DiagramError::Validation(v) => match v.kind {
                ValidationErrorKind::InstructionsTooLong => "instructions_too_long",
                ValidationErrorKind::ReservedRepository => "reserved_repository",
                ValidationErrorKind::Format => "invalid_request",
            },
            DiagramError::BudgetRequiresKey { .. } | DiagramError::BudgetRejected { .. } => {
                "token_budget"
            }
            DiagramError::Repository { .. } => {
                if err.is_not_found() {
                    "not_found"
                } else {
                    "repository"
                }
            }
            DiagramError::Llm(_) | DiagramError::LlmApi(_) => "provider",
            _ => "internal",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(
            ValidationError::new(ValidationErrorKind::Format, rejection.body_text()).into(),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        (self.status(), Json(payload)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
