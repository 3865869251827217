//! One reporting session: draft, photo capture and the final submit step

use crate::draft::DraftStore;
use crate::image_normalizer::{DecodeError, ImageNormalizer};
use crate::upload::{UploadOrchestrator, UploadOutcome};
use crate::validation::{validate, ValidationError};

/// Result of the final wizard step
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    /// Draft incomplete; send the user to `redirect_target`. Nothing was sent.
    Redirect(ValidationError),
    Submitted(UploadOutcome),
}

pub struct ReportSession {
    store: DraftStore,
    orchestrator: UploadOrchestrator,
    normalizer: ImageNormalizer,
}

impl ReportSession {
    pub fn new(orchestrator: UploadOrchestrator) -> Self {
        Self::with_normalizer(orchestrator, ImageNormalizer::default())
    }

    pub fn with_normalizer(orchestrator: UploadOrchestrator, normalizer: ImageNormalizer) -> Self {
        Self {
            store: DraftStore::new(),
            orchestrator,
            normalizer,
        }
    }

    pub fn store(&self) -> &DraftStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DraftStore {
        &mut self.store
    }

    pub fn orchestrator(&self) -> &UploadOrchestrator {
        &self.orchestrator
    }

    /// Normalise a captured photo and append it to the draft
    ///
    /// Returns the new photo count. A photo that cannot be decoded leaves the
    /// draft untouched.
    pub async fn capture_photo(&mut self, raw: Vec<u8>) -> Result<usize, DecodeError> {
        let image = self.normalizer.normalize_async(raw).await.map_err(|e| {
            tracing::warn!(error = %e, "Captured photo rejected");
            e
        })?;
        Ok(self.store.add_photo(image.data_url))
    }

    /// Validate and submit; the draft is reset only after a successful upload
    pub async fn finalize(&mut self) -> FinalizeOutcome {
        if let Some(err) = validate(self.store.draft()) {
            tracing::debug!(kind = ?err.kind, redirect = err.redirect_target, "Draft incomplete");
            return FinalizeOutcome::Redirect(err);
        }

        let outcome = self.orchestrator.submit(self.store.draft()).await;
        if outcome.should_clear_draft() {
            self.store.reset();
        }
        FinalizeOutcome::Submitted(outcome)
    }
}
