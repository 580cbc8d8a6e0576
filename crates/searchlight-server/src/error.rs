//! API error type and its JSON response form.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use searchlight_core::SearchlightError;
use searchlight_db::DatabaseError;
use searchlight_metrics::MetricsError;
use searchlight_permissions::PermissionError;
use searchlight_runner::RunnerError;
use serde_json::json;
use thiserror::Error;

/// Error returned by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input (400)
    #[error("{0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// State conflict (409)
    #[error("{0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound => Self::NotFound("record not found".to_string()),
            DatabaseError::NotFoundWithMessage(msg) => Self::NotFound(msg),
            DatabaseError::Conflict(msg) => Self::Conflict(msg),
            DatabaseError::Invalid(msg) => Self::BadRequest(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<PermissionError> for ApiError {
    fn from(err: PermissionError) -> Self {
        Self::Forbidden(err.to_string())
    }
}

impl From<RunnerError> for ApiError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Database(e) => e.into(),
            RunnerError::InvalidTarget(e) => Self::BadRequest(e.to_string()),
            RunnerError::AuditNotFound(id) => Self::NotFound(format!("Audit '{id}' not found")),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<MetricsError> for ApiError {
    fn from(err: MetricsError) -> Self {
        match err {
            MetricsError::UnknownPlatform(_) => Self::NotFound(err.to_string()),
            MetricsError::InvalidPayload { .. } | MetricsError::Json(_) => {
                Self::BadRequest(err.to_string())
            }
        }
    }
}

impl From<SearchlightError> for ApiError {
    fn from(err: SearchlightError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
