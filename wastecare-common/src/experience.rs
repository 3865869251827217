//! Experience point policy
//!
//! A fixed table maps each qualifying action to its point value. The awarder
//! credits points through the persistence collaborator's `add_user_exp`
//! procedure and performs no deduplication: callers invoke it at most once per
//! logical action.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::backend::{BackendResult, PersistenceService};
use crate::events::{EventBus, WasteCareEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExperienceAction {
    CreateReport,
    JoinCampaign,
    CompleteCampaign,
    CreateCampaign,
}

impl ExperienceAction {
    pub const ALL: [ExperienceAction; 4] = [
        ExperienceAction::CreateReport,
        ExperienceAction::JoinCampaign,
        ExperienceAction::CompleteCampaign,
        ExperienceAction::CreateCampaign,
    ];

    pub fn points(self) -> u32 {
        match self {
            ExperienceAction::CreateReport => 100,
            ExperienceAction::JoinCampaign => 50,
            ExperienceAction::CompleteCampaign => 200,
            ExperienceAction::CreateCampaign => 150,
        }
    }
}

/// Credits experience points to users
#[derive(Clone)]
pub struct ExperienceAwarder {
    backend: Arc<dyn PersistenceService>,
    event_bus: Option<EventBus>,
}

impl ExperienceAwarder {
    pub fn new(backend: Arc<dyn PersistenceService>) -> Self {
        Self {
            backend,
            event_bus: None,
        }
    }

    /// Also announce each award on `event_bus`
    pub fn with_events(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Credit `action`'s points to `user_id`; returns the points credited
    pub async fn award(&self, user_id: &str, action: ExperienceAction) -> BackendResult<u32> {
        let points = action.points();
        self.backend
            .rpc(
                "add_user_exp",
                json!({ "user_id": user_id, "exp_amount": points }),
            )
            .await?;

        tracing::info!(user_id, action = ?action, points, "Experience awarded");
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(WasteCareEvent::ExperienceAwarded {
                user_id: user_id.to_string(),
                action,
                points,
                timestamp: chrono::Utc::now(),
            });
        }
        Ok(points)
    }
}
