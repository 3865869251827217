//! AI classification of the captured photos

use wastecare_common::backend::ClassificationService;
use wastecare_common::Classification;

use crate::draft::DraftStore;

/// Classify the draft's first photo and record the result
///
/// Returns the stored classification. Nothing is stored when the draft has no
/// photo, already carries a classification, or the service fails or has no
/// answer; the user then fills in the manual fields instead.
pub async fn classify_draft(
    store: &mut DraftStore,
    classifier: &dyn ClassificationService,
) -> Option<Classification> {
    if store.draft().ai_validation.is_some() {
        return None;
    }
    let photo = store.draft().photos.first()?.clone();

    match classifier.classify(&photo).await {
        Ok(Some(classification)) => {
            store.set_ai_validation(classification);
            tracing::info!(
                waste_type = ?classification.waste_type,
                waste_volume = ?classification.waste_volume,
                "Photo classified"
            );
            Some(classification)
        }
        Ok(None) => {
            tracing::debug!("Classifier had no result; manual entry required");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Classification failed; manual entry required");
            None
        }
    }
}
