//! Backend-as-a-service collaborators
//!
//! The report pipeline and the HTTP API talk to persistence and
//! authentication only through the traits in this module:
//! - [`PersistenceService`]: report/revalidation records and remote procedures
//! - [`AuthService`]: sessions and the user directory
//! - [`ClassificationService`]: AI classification of a captured photo
//!
//! Two implementations are provided: [`RemoteBackend`] for the hosted REST
//! backend and [`SqliteBackend`] for a local relational store.

mod remote;
mod sqlite;

pub use remote::RemoteBackend;
pub use sqlite::SqliteBackend;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::{
    Classification, CreatedRecord, Credentials, ReportPayload, RevalidationPayload, Session,
    SignUpData, UserFilter, UserSummary,
};

/// Result type for backend calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Failure of a backend call
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Network failure, timeout, or the service being unavailable
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered and rejected the request
    #[error("Service error {status}: {}", .message.as_deref().unwrap_or("no reason given"))]
    Service { status: u16, message: Option<String> },

    /// Required credentials or URLs are missing
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The service answered with a body we could not interpret
    #[error("Decode error: {0}")]
    Decode(String),
}

impl BackendError {
    /// Whether retrying the identical request can reasonably succeed
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Transport(_) => true,
            BackendError::Service { status, .. } => *status >= 500 || *status == 429,
            BackendError::Configuration(_) | BackendError::Decode(_) => false,
        }
    }
}

impl From<crate::Error> for BackendError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::Config(msg) => BackendError::Configuration(msg),
            crate::Error::NotFound(msg) => BackendError::Service {
                status: 404,
                message: Some(msg),
            },
            crate::Error::InvalidInput(msg) => BackendError::Service {
                status: 400,
                message: Some(msg),
            },
            crate::Error::Database(sqlx::Error::Database(db_err)) => {
                let status = match db_err.kind() {
                    sqlx::error::ErrorKind::UniqueViolation => 409,
                    sqlx::error::ErrorKind::Other => 500,
                    _ => 400,
                };
                BackendError::Service {
                    status,
                    message: Some(db_err.message().to_string()),
                }
            }
            crate::Error::Database(sqlx::Error::RowNotFound) => BackendError::Service {
                status: 404,
                message: Some("no matching row".to_string()),
            },
            // Pool exhaustion, I/O and protocol failures may clear on retry
            other => BackendError::Transport(other.to_string()),
        }
    }
}

/// Relational storage and remote procedures
#[async_trait]
pub trait PersistenceService: Send + Sync {
    /// Create a report record and return its id
    async fn create_report(&self, payload: &ReportPayload) -> BackendResult<CreatedRecord>;

    /// Create a revalidation record for an existing report
    async fn create_revalidation(
        &self,
        payload: &RevalidationPayload,
    ) -> BackendResult<CreatedRecord>;

    /// Invoke a named remote procedure; returns its rows as JSON
    async fn rpc(&self, name: &str, args: Value) -> BackendResult<Value>;
}

/// Authentication and user directory
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_in(&self, credentials: &Credentials) -> BackendResult<Session>;

    async fn sign_up(&self, data: &SignUpData) -> BackendResult<UserSummary>;

    async fn sign_out(&self) -> BackendResult<()>;

    /// Current session, if signed in
    async fn get_session(&self) -> BackendResult<Option<Session>>;

    async fn list_users(&self, filter: &UserFilter) -> BackendResult<Vec<UserSummary>>;
}

/// AI image classification
///
/// `Ok(None)` means the service had no confident answer.
#[async_trait]
pub trait ClassificationService: Send + Sync {
    async fn classify(&self, photo: &str) -> BackendResult<Option<Classification>>;
}

/// Pull a human-readable reason out of an error body
///
/// Hosted backends are inconsistent about the field name.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error", "details"]
        .iter()
        .find_map(|key| json.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}
