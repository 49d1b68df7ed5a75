use crate::services::{
    archive_resolver::ResolveError, archive_store::StorageError, order_service::OrderError,
    reporter_client::UpstreamError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Orders failures are reported as client errors.
impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        AppError::bad_request(err.to_string())
    }
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        AppError::new(StatusCode::FORBIDDEN, err.to_string())
    }
}

impl From<UpstreamError> for AppError {
    fn from(err: UpstreamError) -> Self {
        tracing::warn!("reporter call failed: {}", err);
        AppError::internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ArchiveNotFound { .. } => AppError::not_found(err.to_string()),
            StorageError::InvalidArchiveKey => AppError::bad_request(err.to_string()),
            other => AppError::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_statuses() {
        let not_found: AppError = StorageError::ArchiveNotFound {
            bucket: "reports".into(),
            key: "1".into(),
        }
        .into();
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);

        let invalid: AppError = StorageError::InvalidArchiveKey.into();
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_status_keeps_body_as_message() {
        let err: AppError = UpstreamError::Status {
            status: StatusCode::NOT_FOUND,
            body: "archive `9` not found".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "archive `9` not found");
    }

    #[test]
    fn rejected_resolution_is_forbidden() {
        let err: AppError = ResolveError::Rejected("http://evil".into()).into();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }
}
