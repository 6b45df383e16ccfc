//! Error types for apollo-hv
//!
//! `PipelineError` is the single error type every verification stage
//! returns. `ApiError` is what HTTP handlers return.

use apollo_common::db::ReportStatus;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Verification pipeline error
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or missing report fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing blob or report
    #[error("Not found: {0}")]
    NotFound(String),

    /// Blob exists but holds zero bytes
    #[error("Media {media_id} has an empty payload")]
    EmptyPayload { media_id: i64 },

    /// Video yielded no decodable sample frame
    #[error("No frames extracted from {0}")]
    NoFramesExtracted(String),

    /// Scratch path already occupied by a leftover file
    #[error("Stale scratch file present: {}", .0.display())]
    StaleScratchFile(PathBuf),

    /// Decode, classification call, or deadline failure
    #[error("Inference failure: {0}")]
    Inference(String),

    /// Store read or write failed
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Transition out of a terminal state
    #[error("Illegal transition for report {report_id}: {from} -> {to}")]
    IllegalTransition {
        report_id: i64,
        from: ReportStatus,
        to: ReportStatus,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<apollo_common::Error> for PipelineError {
    fn from(err: apollo_common::Error) -> Self {
        match err {
            apollo_common::Error::Validation(msg) => PipelineError::Validation(msg),
            apollo_common::Error::NotFound(msg) => PipelineError::NotFound(msg),
            apollo_common::Error::Io(e) => PipelineError::Io(e),
            other => PipelineError::Persistence(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::Persistence(err.to_string())
    }
}

/// Result type for pipeline stages
pub type PipelineResult<T> = Result<T, PipelineError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Request body over the configured cap (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Conflict (409), e.g. a notification consumer is already attached
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Common error: {0}")]
    Common(#[from] apollo_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Pipeline(ref err) => match err {
                PipelineError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
                }
                PipelineError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PIPELINE_ERROR",
                    err.to_string(),
                ),
            },
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
