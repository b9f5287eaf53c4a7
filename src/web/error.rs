//! HTTP rendering of `ApiError`.

use crate::error::{ApiError, StoreError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Error body returned by every route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

/// Result type for route handlers.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            // Only reachable when a caller surfaces a rejection outside an `Ack`.
            ApiError::CommandRejected(_) => StatusCode::CONFLICT,
            ApiError::StoreError(StoreError::InvalidPath(_)) => StatusCode::BAD_REQUEST,
            ApiError::StoreError(_) => StatusCode::BAD_GATEWAY,
            ApiError::ConfigError(_) | ApiError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }
        let body = ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
