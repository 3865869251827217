//! Validation gate for the final wizard step
//!
//! Checks run in a fixed order (location, then photos) and only the first
//! failure is reported, together with the step the user is sent back to.

use serde::Serialize;
use thiserror::Error;

use crate::draft::ReportDraft;

/// Wizard step that captures the location
pub const LOCATION_STEP: &str = "/lapor";

/// Wizard step that captures and confirms photos
pub const PHOTO_STEP: &str = "/lapor/konfirmasi-foto";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationKind {
    Location,
    Photos,
}

/// Incomplete draft, with the step that owns the missing data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub kind: ValidationKind,
    pub message: String,
    pub redirect_target: &'static str,
}

impl ValidationError {
    pub fn location() -> Self {
        Self {
            kind: ValidationKind::Location,
            message: "Please set the waste location before submitting.".to_string(),
            redirect_target: LOCATION_STEP,
        }
    }

    pub fn photos() -> Self {
        Self {
            kind: ValidationKind::Photos,
            message: "Please add at least one photo before submitting.".to_string(),
            redirect_target: PHOTO_STEP,
        }
    }
}

/// First failing completeness check, or `None` when the draft can be submitted
pub fn validate(draft: &ReportDraft) -> Option<ValidationError> {
    if draft.location.is_none() {
        return Some(ValidationError::location());
    }
    if draft.photos.is_empty() {
        return Some(ValidationError::photos());
    }
    None
}
