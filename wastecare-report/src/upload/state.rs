//! Upload state and outcomes

use serde::Serialize;
use uuid::Uuid;

use super::failure::UploadFailure;

/// Identifies one submission attempt
pub type AttemptId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Idle,
    Uploading,
    Success,
    Failed,
}

/// Observable state of the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadState {
    pub status: UploadStatus,
    /// Percentage complete (0-100), never decreasing within an attempt
    pub progress: u8,
    pub last_error: Option<String>,
    /// Attempt this state belongs to; `None` when idle
    pub attempt_id: Option<AttemptId>,
}

impl Default for UploadState {
    fn default() -> Self {
        Self {
            status: UploadStatus::Idle,
            progress: 0,
            last_error: None,
            attempt_id: None,
        }
    }
}

impl UploadState {
    pub(crate) fn uploading(attempt_id: AttemptId) -> Self {
        Self {
            status: UploadStatus::Uploading,
            progress: 0,
            last_error: None,
            attempt_id: Some(attempt_id),
        }
    }

    /// Whether results for `attempt_id` may still be applied
    pub(crate) fn is_active(&self, attempt_id: AttemptId) -> bool {
        self.status == UploadStatus::Uploading && self.attempt_id == Some(attempt_id)
    }

    /// Move progress forward; returns the new value if it changed
    pub(crate) fn advance(&mut self, to: u8) -> Option<u8> {
        let to = to.min(100);
        if to > self.progress {
            self.progress = to;
            Some(to)
        } else {
            None
        }
    }
}

/// Result of one `submit` call
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// Stored; the caller should clear the draft
    Succeeded {
        attempt_id: AttemptId,
        record_id: String,
        /// Points credited, `None` if nothing was due or the award failed
        points_awarded: Option<u32>,
    },

    /// Not stored; the draft is kept for a retry
    Failed {
        attempt_id: AttemptId,
        failure: UploadFailure,
    },

    /// A newer attempt started (or this one was abandoned) before the
    /// result arrived; the result was discarded
    Superseded { attempt_id: AttemptId },
}

impl UploadOutcome {
    pub fn attempt_id(&self) -> AttemptId {
        match self {
            UploadOutcome::Succeeded { attempt_id, .. }
            | UploadOutcome::Failed { attempt_id, .. }
            | UploadOutcome::Superseded { attempt_id } => *attempt_id,
        }
    }

    /// The draft has been persisted and can be reset
    pub fn should_clear_draft(&self) -> bool {
        matches!(self, UploadOutcome::Succeeded { .. })
    }
}
