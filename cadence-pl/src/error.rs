//! Error types for cadence-pl

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::services::SourceError;

/// Failure of one playlist build
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Request rejected before any external call
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Playlist creation or track addition failed
    #[error("Catalog {operation} failed: {source}")]
    Catalog {
        operation: &'static str,
        #[source]
        source: SourceError,
    },

    /// Run exceeded its overall deadline
    #[error("Playlist build exceeded its {0:?} deadline")]
    DeadlineExceeded(Duration),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upstream catalog failure (502)
    #[error("Upstream error: {0}")]
    BadGateway(String),

    /// Build ran out of time (504)
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// cadence-common error
    #[error("Common error: {0}")]
    Common(#[from] cadence_common::Error),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            err @ PipelineError::Catalog { .. } => ApiError::BadGateway(err.to_string()),
            err @ PipelineError::DeadlineExceeded(_) => ApiError::Timeout(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
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
