//! Error types for voxide-ta
//!
//! `ApiError` is the HTTP boundary: the status code tells the event fabric
//! whether redelivery can help. 5xx means retryable (transient upstream or
//! internal trouble); 4xx means the request itself is bad and retrying the
//! same payload cannot succeed. Logically inconsistent pipeline states
//! (matching failures, failed job sets) are NOT errors at this boundary —
//! handlers report them in a 200 body so the fabric stops redelivering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::pipeline::{transcript::TranscriptError, PipelineError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upstream service failure (502) - retryable via redelivery
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// voxide-common error
    #[error("Common error: {0}")]
    Common(#[from] voxide_common::Error),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            // A transcript that is missing, empty, or unreadable cannot be
            // fixed by redelivering the same event
            PipelineError::Transcript(TranscriptError::Missing(key)) => {
                ApiError::BadRequest(format!("Transcript artifact not found: {}", key))
            }
            PipelineError::Transcript(TranscriptError::Empty) => {
                ApiError::BadRequest("Transcript contains no text".to_string())
            }
            PipelineError::Transcript(TranscriptError::Malformed(reason)) => {
                ApiError::BadRequest(format!("Transcript artifact is malformed: {}", reason))
            }
            PipelineError::Transcript(TranscriptError::Store(reason)) => {
                ApiError::Internal(format!("Store error reading transcript: {}", reason))
            }
            // Analytics-engine failures (timeouts, throttling, 5xx) are
            // transient; the fabric redelivers and handlers are idempotent
            PipelineError::Analytics(e) => ApiError::Upstream(e.to_string()),
            PipelineError::Store(e) => ApiError::Internal(e.to_string()),
            PipelineError::MissingJobOutput { location } => {
                ApiError::Internal(format!("No job output found under {}", location))
            }
            PipelineError::MalformedJobOutput { location, reason } => {
                ApiError::Internal(format!("Malformed job output at {}: {}", location, reason))
            }
            PipelineError::Serialization(reason) => ApiError::Internal(reason),
            PipelineError::Common(e) => ApiError::Common(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
