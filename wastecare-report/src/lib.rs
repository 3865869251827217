//! wastecare-report - report submission pipeline
//!
//! The reporting flow is a wizard: location → photos → confirm → upload.
//! Each step writes into a [`DraftStore`] that is passed explicitly from step
//! to step; the final step runs the validation gate and hands the draft to
//! the [`UploadOrchestrator`]. [`ReportSession`] bundles the two for callers
//! that want the whole flow.

pub mod classification;
pub mod draft;
pub mod image_normalizer;
pub mod permission;
pub mod revalidation;
pub mod session;
pub mod upload;
pub mod validation;

pub use classification::classify_draft;
pub use draft::{DraftStore, EffectiveClassification, ReportDraft};
pub use image_normalizer::{DecodeError, ImageNormalizer, NormalizedImage};
pub use permission::{
    ChangeSubscription, GeolocationProvider, LocationError, PermissionMonitor, PermissionPlatform,
    PermissionState, PlatformError,
};
pub use revalidation::RevalidationDraft;
pub use session::{FinalizeOutcome, ReportSession};
pub use upload::{
    AttemptId, UploadFailure, UploadOrchestrator, UploadOutcome, UploadState, UploadStatus,
};
pub use validation::{validate, ValidationError, ValidationKind};
