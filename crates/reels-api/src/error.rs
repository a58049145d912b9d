//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use reels_queue::QueueError;
use reels_worker::WorkerError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Rate limited")]
    RateLimited,

    /// The render pipeline failed; details live on the job record.
    #[error("Render failed")]
    RenderFailed,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Worker(WorkerError::JobNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::RenderFailed | ApiError::Internal(_) | ApiError::Worker(_) | ApiError::Queue(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) | ApiError::Worker(WorkerError::JobNotFound(_)) => "not_found",
            ApiError::RateLimited => "rate_limited",
            ApiError::RenderFailed => "render_failed",
            ApiError::Internal(_) | ApiError::Worker(_) | ApiError::Queue(_) => "internal",
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = match &self {
            ApiError::Worker(WorkerError::JobNotFound(_)) => "Job not found".to_string(),
            ApiError::RenderFailed => self.to_string(),
            _ if self.is_internal() => {
                if std::env::var("ENVIRONMENT").is_ok_and(|v| v.eq_ignore_ascii_case("production")) {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            detail,
            code: Some(self.code().to_string()),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reels_models::JobId;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::bad_request("Missing jobId").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(WorkerError::JobNotFound(JobId::from_string("x"))).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::RenderFailed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiError::from(WorkerError::store("unavailable")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_bad_request_message_is_verbatim() {
        assert_eq!(ApiError::bad_request("Missing jobId").to_string(), "Missing jobId");
    }
}
