//! Axum-specific error types and mappings.
//!
//! Maps `CoreError` to HTTP status codes and a small JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use signage_core::CoreError;
use thiserror::Error;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Service unavailable (e.g., directory backend down).
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl HttpError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::ServiceUnavailable(msg) => msg,
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), %error, "Request failed");
        }

        let body = ErrorBody {
            error,
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<CoreError> for HttpError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            CoreError::Validation(msg) => Self::BadRequest(msg),
            CoreError::Directory(e) => Self::ServiceUnavailable(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signage_core::DirectoryError;

    #[test]
    fn test_core_error_mapping() {
        let not_found: HttpError = CoreError::NotFound {
            entity: "Display",
            id: "x".to_string(),
        }
        .into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_string(), "Not found: Display not found: x");

        let invalid: HttpError = CoreError::Validation("Invalid command".to_string()).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let backend: HttpError =
            CoreError::Directory(DirectoryError::Storage("down".to_string())).into();
        assert_eq!(backend.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
