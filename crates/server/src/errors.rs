use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use service::{ServiceError, StorageError};
use thiserror::Error;
use tracing::{error, warn};

/// JSON error response: `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), error = %self.message, "request failed");
        }
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

/// NotFound is 404, duplicates and validation failures are 400, anything
/// else is a 500.
impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::bad_request(msg),
            ServiceError::Storage(StorageError::NotFound(_)) => ApiError::new(StatusCode::NOT_FOUND, "note not found"),
            ServiceError::Storage(e @ StorageError::AlreadyExists(_)) => ApiError::bad_request(e.to_string()),
            ServiceError::Storage(e) => {
                warn!(code = e.code(), error = %e, "storage failure");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(format!("invalid request body: {}", rejection.body_text()))
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_http_status() {
        let cases = [
            (StorageError::not_found("n1"), StatusCode::NOT_FOUND),
            (StorageError::AlreadyExists("n1".into()), StatusCode::BAD_REQUEST),
            (StorageError::Conflict("n1".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (StorageError::Unavailable("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (StorageError::Cancelled, StatusCode::INTERNAL_SERVER_ERROR),
            (StorageError::DeadlineExceeded, StatusCode::INTERNAL_SERVER_ERROR),
            (StorageError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(ServiceError::from(err.clone())).status(), status, "{err:?}");
        }
        assert_eq!(ApiError::from(ServiceError::Validation("bad".into())).status(), StatusCode::BAD_REQUEST);
    }
}
