//! Event types for the Waste Care event system
//!
//! Provides shared event definitions and the EventBus used by the report
//! pipeline to notify observers (UI bindings, SSE bridges, tests).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::experience::ExperienceAction;

/// Waste Care event types
///
/// Events are broadcast via EventBus and can be serialized for transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WasteCareEvent {
    /// Submission attempt started (progress 0)
    UploadStarted {
        attempt_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Submission progress moved forward
    ///
    /// Delivered in non-decreasing order for a given attempt.
    UploadProgress {
        attempt_id: Uuid,
        /// Percentage complete (0-100)
        progress: u8,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Submission stored by the persistence collaborator
    UploadSucceeded {
        attempt_id: Uuid,
        record_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Submission failed; the draft is kept for a user-initiated retry
    UploadFailed {
        attempt_id: Uuid,
        message: String,
        retryable: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Location permission changed (as reported by the platform)
    PermissionChanged {
        state: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Experience points credited to a user
    ExperienceAwarded {
        user_id: String,
        action: ExperienceAction,
        points: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl WasteCareEvent {
    /// Event name used as the SSE `event:` field and in logs
    pub fn event_type(&self) -> &'static str {
        match self {
            WasteCareEvent::UploadStarted { .. } => "UploadStarted",
            WasteCareEvent::UploadProgress { .. } => "UploadProgress",
            WasteCareEvent::UploadSucceeded { .. } => "UploadSucceeded",
            WasteCareEvent::UploadFailed { .. } => "UploadFailed",
            WasteCareEvent::PermissionChanged { .. } => "PermissionChanged",
            WasteCareEvent::ExperienceAwarded { .. } => "ExperienceAwarded",
        }
    }
}

/// Broadcast channel wrapper shared by producers and observers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WasteCareEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<WasteCareEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: WasteCareEvent,
    ) -> Result<usize, broadcast::error::SendError<WasteCareEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: WasteCareEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
