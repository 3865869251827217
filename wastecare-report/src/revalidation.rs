//! Follow-up check of an existing report
//!
//! A revalidation records whether a previously reported spot has been cleaned.
//! It is submitted through the same orchestrator as a report and follows the
//! same progress and failure rules, but earns no experience.

use wastecare_common::models::{RevalidationPayload, RevalidationStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct RevalidationDraft {
    report_id: String,
    status: RevalidationStatus,
    photo: Option<String>,
    notes: Option<String>,
}

impl RevalidationDraft {
    pub fn new(report_id: impl Into<String>, status: RevalidationStatus) -> Self {
        Self {
            report_id: report_id.into(),
            status,
            photo: None,
            notes: None,
        }
    }

    pub fn report_id(&self) -> &str {
        &self.report_id
    }

    pub fn status(&self) -> RevalidationStatus {
        self.status
    }

    pub fn set_status(&mut self, status: RevalidationStatus) {
        self.status = status;
    }

    /// Optional evidence photo, already normalised
    pub fn set_photo(&mut self, photo: Option<String>) {
        self.photo = photo;
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = notes.filter(|n| !n.trim().is_empty());
    }

    pub fn to_payload(&self, user_id: &str) -> RevalidationPayload {
        RevalidationPayload {
            report_id: self.report_id.clone(),
            user_id: user_id.to_string(),
            status: self.status,
            photo: self.photo.clone(),
            notes: self.notes.clone(),
        }
    }
}
