//! Error responses for wastecare-api
//!
//! Every error is rendered as `{"error": "<message>"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use wastecare_common::backend::BackendError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request (400)
    #[error("{0}")]
    BadRequest(String),

    /// The capability is not offered by the configured backend (404)
    #[error("{0}")]
    NotAvailable(String),

    /// Backend credentials or URL missing (500)
    #[error("{0}")]
    NotConfigured(String),

    /// The backend call failed (500)
    #[error("{0}")]
    Upstream(BackendError),

    /// Local failure (500)
    #[error("{0}")]
    Internal(String),
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Configuration(msg) => ApiError::NotConfigured(msg),
            BackendError::Service {
                status: 404,
                message,
            } => ApiError::NotAvailable(
                message.unwrap_or_else(|| "not available on this backend".to_string()),
            ),
            other => ApiError::Upstream(other),
        }
    }
}

impl From<wastecare_common::Error> for ApiError {
    fn from(err: wastecare_common::Error) -> Self {
        match err {
            wastecare_common::Error::Config(msg) => ApiError::NotConfigured(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotAvailable(_) => StatusCode::NOT_FOUND,
            ApiError::NotConfigured(_) | ApiError::Upstream(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
