//! Upload orchestrator
//!
//! Drives one submission attempt at a time through the persistence
//! collaborator and exposes its progress.
//!
//! # State Progression
//! IDLE → UPLOADING (0 → 25 → 90 → 100) → SUCCESS | FAILED
//!
//! Every attempt carries an [`AttemptId`]. A result only applies while its
//! attempt is still the current one; results of abandoned or replaced attempts
//! are discarded and reported as [`UploadOutcome::Superseded`]. Experience is
//! credited once per successful report, after the record has been stored.

mod failure;
mod state;

pub use failure::UploadFailure;
pub use state::{AttemptId, UploadOutcome, UploadState, UploadStatus};

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use wastecare_common::backend::{BackendResult, PersistenceService};
use wastecare_common::events::{EventBus, WasteCareEvent};
use wastecare_common::models::{CreatedRecord, ReportPayload, RevalidationPayload};
use wastecare_common::{ExperienceAction, ExperienceAwarder};

use crate::draft::ReportDraft;
use crate::revalidation::RevalidationDraft;
use crate::validation::ValidationError;

/// Payload prepared
pub const PROGRESS_PREPARED: u8 = 25;
/// Record stored by the collaborator
pub const PROGRESS_STORED: u8 = 90;
pub const PROGRESS_DONE: u8 = 100;

/// What an attempt persists
enum Submission {
    Report(ReportPayload),
    Revalidation(RevalidationPayload),
}

impl Submission {
    fn kind(&self) -> &'static str {
        match self {
            Submission::Report(_) => "report",
            Submission::Revalidation(_) => "revalidation",
        }
    }

    fn experience_action(&self) -> Option<ExperienceAction> {
        match self {
            Submission::Report(_) => Some(ExperienceAction::CreateReport),
            // Checking a report again is not a qualifying action
            Submission::Revalidation(_) => None,
        }
    }
}

/// Upload orchestrator service
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct UploadOrchestrator {
    backend: Arc<dyn PersistenceService>,
    awarder: ExperienceAwarder,
    event_bus: EventBus,
    user_id: String,
    state: Arc<RwLock<UploadState>>,
}

impl UploadOrchestrator {
    /// Create an orchestrator submitting on behalf of `user_id`
    pub fn new(
        backend: Arc<dyn PersistenceService>,
        awarder: ExperienceAwarder,
        event_bus: EventBus,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            awarder,
            event_bus,
            user_id: user_id.into(),
            state: Arc::new(RwLock::new(UploadState::default())),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Current state snapshot
    pub async fn state(&self) -> UploadState {
        self.state.read().await.clone()
    }

    /// Submit a report draft
    ///
    /// The draft itself is never modified; on success the caller resets it
    /// (see [`UploadOutcome::should_clear_draft`]).
    pub async fn submit(&self, draft: &ReportDraft) -> UploadOutcome {
        let prepared = draft.to_payload(&self.user_id).map(Submission::Report);
        self.run(prepared).await
    }

    /// Submit a follow-up check of an existing report
    pub async fn submit_revalidation(&self, draft: &RevalidationDraft) -> UploadOutcome {
        let prepared = Ok(Submission::Revalidation(draft.to_payload(&self.user_id)));
        self.run(prepared).await
    }

    /// Drop the in-flight attempt, if any
    ///
    /// Its eventual result is discarded. State returns to idle.
    pub async fn abandon(&self) {
        let mut state = self.state.write().await;
        if state.status == UploadStatus::Uploading {
            tracing::info!(attempt_id = ?state.attempt_id, "Upload abandoned");
        }
        *state = UploadState::default();
    }

    /// Clear a finished attempt (success or failure) back to idle
    ///
    /// Has no effect while an attempt is running.
    pub async fn acknowledge(&self) {
        let mut state = self.state.write().await;
        if state.status != UploadStatus::Uploading {
            *state = UploadState::default();
        }
    }

    async fn run(&self, prepared: Result<Submission, ValidationError>) -> UploadOutcome {
        let attempt_id = self.begin().await;

        let submission = match prepared {
            Ok(submission) => submission,
            Err(err) => {
                // The gate should have caught this before submit
                tracing::warn!(%attempt_id, kind = ?err.kind, "Incomplete draft reached upload");
                return self
                    .finish_failure(attempt_id, UploadFailure::UpstreamValidation(err))
                    .await;
            }
        };

        if !self.advance(attempt_id, PROGRESS_PREPARED).await {
            return UploadOutcome::Superseded { attempt_id };
        }

        tracing::debug!(%attempt_id, kind = submission.kind(), "Sending submission");
        match self.store(&submission).await {
            Ok(record) => self.complete(attempt_id, &submission, record).await,
            Err(err) => {
                tracing::warn!(%attempt_id, kind = submission.kind(), error = %err, "Submission failed");
                self.finish_failure(attempt_id, UploadFailure::from(err))
                    .await
            }
        }
    }

    async fn store(&self, submission: &Submission) -> BackendResult<CreatedRecord> {
        match submission {
            Submission::Report(payload) => self.backend.create_report(payload).await,
            Submission::Revalidation(payload) => self.backend.create_revalidation(payload).await,
        }
    }

    /// Start a new attempt, replacing whatever was there
    async fn begin(&self) -> AttemptId {
        let attempt_id = Uuid::new_v4();
        {
            let mut state = self.state.write().await;
            if state.status == UploadStatus::Uploading {
                tracing::info!(
                    previous = ?state.attempt_id,
                    %attempt_id,
                    "New attempt supersedes in-flight upload"
                );
            }
            *state = UploadState::uploading(attempt_id);
        }

        tracing::info!(%attempt_id, user_id = %self.user_id, "Upload started");
        let now = Utc::now();
        self.event_bus.emit_lossy(WasteCareEvent::UploadStarted {
            attempt_id,
            timestamp: now,
        });
        self.event_bus.emit_lossy(WasteCareEvent::UploadProgress {
            attempt_id,
            progress: 0,
            timestamp: now,
        });
        attempt_id
    }

    /// Move the attempt's progress forward; false once the attempt is stale
    async fn advance(&self, attempt_id: AttemptId, to: u8) -> bool {
        let moved = {
            let mut state = self.state.write().await;
            if !state.is_active(attempt_id) {
                return false;
            }
            state.advance(to)
        };

        if let Some(progress) = moved {
            self.event_bus.emit_lossy(WasteCareEvent::UploadProgress {
                attempt_id,
                progress,
                timestamp: Utc::now(),
            });
        }
        true
    }

    async fn complete(
        &self,
        attempt_id: AttemptId,
        submission: &Submission,
        record: CreatedRecord,
    ) -> UploadOutcome {
        let milestones: Vec<u8> = {
            let mut state = self.state.write().await;
            if !state.is_active(attempt_id) {
                tracing::info!(%attempt_id, record_id = %record.id, "Discarding result of stale attempt");
                return UploadOutcome::Superseded { attempt_id };
            }
            let milestones = [PROGRESS_STORED, PROGRESS_DONE]
                .into_iter()
                .filter_map(|to| state.advance(to))
                .collect();
            state.status = UploadStatus::Success;
            state.last_error = None;
            milestones
        };

        for progress in milestones {
            self.event_bus.emit_lossy(WasteCareEvent::UploadProgress {
                attempt_id,
                progress,
                timestamp: Utc::now(),
            });
        }
        tracing::info!(%attempt_id, kind = submission.kind(), record_id = %record.id, "Upload succeeded");
        self.event_bus.emit_lossy(WasteCareEvent::UploadSucceeded {
            attempt_id,
            record_id: record.id.clone(),
            timestamp: Utc::now(),
        });

        let points_awarded = match submission.experience_action() {
            Some(action) => match self.awarder.award(&self.user_id, action).await {
                Ok(points) => Some(points),
                Err(e) => {
                    // The record exists; the submission stays successful
                    tracing::warn!(%attempt_id, user_id = %self.user_id, error = %e, "Failed to award experience");
                    None
                }
            },
            None => None,
        };

        UploadOutcome::Succeeded {
            attempt_id,
            record_id: record.id,
            points_awarded,
        }
    }

    async fn finish_failure(&self, attempt_id: AttemptId, failure: UploadFailure) -> UploadOutcome {
        let message = failure.user_message();
        {
            let mut state = self.state.write().await;
            if !state.is_active(attempt_id) {
                tracing::info!(%attempt_id, "Discarding failure of stale attempt");
                return UploadOutcome::Superseded { attempt_id };
            }
            state.status = UploadStatus::Failed;
            state.last_error = Some(message.clone());
        }

        self.event_bus.emit_lossy(WasteCareEvent::UploadFailed {
            attempt_id,
            message,
            retryable: failure.retryable(),
            timestamp: Utc::now(),
        });
        UploadOutcome::Failed {
            attempt_id,
            failure,
        }
    }
}
