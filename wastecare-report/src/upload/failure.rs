//! Submission failure classification

use thiserror::Error;
use wastecare_common::backend::BackendError;

use crate::validation::ValidationError;

/// Why a submission attempt failed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UploadFailure {
    /// The draft reached the orchestrator without passing the gate
    #[error("draft incomplete: {0}")]
    UpstreamValidation(ValidationError),

    /// Network, timeout or service unavailable; retrying may succeed
    #[error("transport failure: {detail}")]
    Transient { detail: String },

    /// The service refused the payload
    #[error("rejected ({status}): {}", .reason.as_deref().unwrap_or("no reason given"))]
    Rejected { status: u16, reason: Option<String> },

    /// Missing credentials or endpoint; not something the user can fix
    #[error("misconfigured: {detail}")]
    Misconfigured { detail: String },
}

impl UploadFailure {
    /// Message recorded in `UploadState::last_error`
    pub fn user_message(&self) -> String {
        match self {
            UploadFailure::UpstreamValidation(err) => err.message.clone(),
            UploadFailure::Transient { .. } => {
                "Upload failed: could not reach the server. Check your connection and try again."
                    .to_string()
            }
            UploadFailure::Rejected {
                reason: Some(reason),
                ..
            } => format!(
                "The server rejected the report: {}. Retrying with the same data will likely fail again.",
                reason
            ),
            UploadFailure::Rejected { reason: None, .. } => {
                "The server rejected the report. Retrying with the same data will likely fail again."
                    .to_string()
            }
            UploadFailure::Misconfigured { .. } => {
                "The service is temporarily unavailable. Please try again later.".to_string()
            }
        }
    }

    /// Whether the UI offers a retry button
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            UploadFailure::Transient { .. } | UploadFailure::Rejected { .. }
        )
    }
}

impl From<BackendError> for UploadFailure {
    fn from(err: BackendError) -> Self {
        if err.is_transient() {
            return UploadFailure::Transient {
                detail: err.to_string(),
            };
        }
        match err {
            BackendError::Service { status, message } => UploadFailure::Rejected {
                status,
                reason: message,
            },
            BackendError::Decode(detail) => UploadFailure::Rejected {
                status: 200,
                reason: Some(format!("unexpected response ({})", detail)),
            },
            BackendError::Configuration(detail) => UploadFailure::Misconfigured { detail },
            BackendError::Transport(detail) => UploadFailure::Transient { detail },
        }
    }
}
