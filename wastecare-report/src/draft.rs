//! Report draft accumulated across wizard steps
//!
//! The [`DraftStore`] is the single owner of the in-progress report. It is an
//! ordinary value handed to each step by `&mut`, so a step can be exercised in
//! isolation with a store of its own.

use wastecare_common::models::{
    LocationCategory, ReportPayload, ReportStatus, WasteType, WasteVolume,
};
use wastecare_common::{Classification, GeoPoint};

use crate::validation::{validate, ValidationError};

/// Snapshot of an in-progress report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportDraft {
    pub location: Option<GeoPoint>,
    /// Encoded photos in capture order
    pub photos: Vec<String>,
    pub notes: Option<String>,
    /// Server-side classification; complete or absent
    pub ai_validation: Option<Classification>,
    pub waste_type: Option<WasteType>,
    pub waste_volume: Option<WasteVolume>,
    pub location_category: Option<LocationCategory>,
}

/// Classification fields to display: AI result first, manual entry second
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectiveClassification {
    pub waste_type: Option<WasteType>,
    pub waste_volume: Option<WasteVolume>,
    pub location_category: Option<LocationCategory>,
}

impl ReportDraft {
    pub fn is_submittable(&self) -> bool {
        self.location.is_some() && !self.photos.is_empty()
    }

    pub fn effective_classification(&self) -> EffectiveClassification {
        match self.ai_validation {
            Some(ai) => EffectiveClassification {
                waste_type: Some(ai.waste_type),
                waste_volume: Some(ai.waste_volume),
                location_category: Some(ai.location_category),
            },
            None => EffectiveClassification {
                waste_type: self.waste_type,
                waste_volume: self.waste_volume,
                location_category: self.location_category,
            },
        }
    }

    /// Wire record for the persistence collaborator
    ///
    /// Carries the manual classification fallbacks; the AI result is assigned
    /// server-side.
    pub fn to_payload(&self, user_id: &str) -> Result<ReportPayload, ValidationError> {
        let location = self.location.ok_or_else(ValidationError::location)?;
        if let Some(err) = validate(self) {
            return Err(err);
        }

        Ok(ReportPayload {
            user_id: user_id.to_string(),
            latitude: location.latitude(),
            longitude: location.longitude(),
            photos: self.photos.clone(),
            notes: self.notes.clone(),
            waste_type: self.waste_type,
            waste_volume: self.waste_volume,
            location_category: self.location_category,
            status: ReportStatus::Pending,
        })
    }
}

/// Owner of the draft for one reporting session
#[derive(Debug, Default)]
pub struct DraftStore {
    draft: ReportDraft,
}

impl DraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &ReportDraft {
        &self.draft
    }

    /// Owned copy of the current draft
    pub fn snapshot(&self) -> ReportDraft {
        self.draft.clone()
    }

    pub fn set_location(&mut self, location: GeoPoint) {
        self.draft.location = Some(location);
    }

    /// Append a photo; returns the new photo count
    pub fn add_photo(&mut self, photo: String) -> usize {
        self.draft.photos.push(photo);
        self.draft.photos.len()
    }

    /// Remove the photo at `index`; out-of-range indices are ignored
    pub fn remove_photo(&mut self, index: usize) -> Option<String> {
        if index < self.draft.photos.len() {
            Some(self.draft.photos.remove(index))
        } else {
            tracing::debug!(
                index,
                len = self.draft.photos.len(),
                "Ignoring out-of-range photo removal"
            );
            None
        }
    }

    /// Blank notes are stored as no notes
    pub fn set_notes(&mut self, notes: Option<String>) {
        self.draft.notes = notes.filter(|n| !n.trim().is_empty());
    }

    /// Record the classification; an existing one is kept
    ///
    /// Returns whether `classification` was stored.
    pub fn set_ai_validation(&mut self, classification: Classification) -> bool {
        if self.draft.ai_validation.is_some() {
            tracing::warn!("Classification already set; ignoring replacement");
            return false;
        }
        self.draft.ai_validation = Some(classification);
        true
    }

    pub fn set_waste_type(&mut self, waste_type: Option<WasteType>) {
        self.draft.waste_type = waste_type;
    }

    pub fn set_waste_volume(&mut self, waste_volume: Option<WasteVolume>) {
        self.draft.waste_volume = waste_volume;
    }

    pub fn set_location_category(&mut self, location_category: Option<LocationCategory>) {
        self.draft.location_category = location_category;
    }

    pub fn reset(&mut self) {
        self.draft = ReportDraft::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification() -> Classification {
        Classification {
            waste_type: WasteType::Hazardous,
            waste_volume: WasteVolume::SixToTenKg,
            location_category: LocationCategory::Market,
        }
    }

    #[test]
    fn test_add_photo_preserves_order() {
        let mut store = DraftStore::new();
        assert_eq!(store.add_photo("first".into()), 1);
        assert_eq!(store.add_photo("second".into()), 2);
        assert_eq!(store.add_photo("third".into()), 3);
        assert_eq!(store.draft().photos, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_remove_photo_in_range() {
        let mut store = DraftStore::new();
        store.add_photo("a".into());
        store.add_photo("b".into());
        store.add_photo("c".into());

        assert_eq!(store.remove_photo(1).as_deref(), Some("b"));
        assert_eq!(store.draft().photos, vec!["a", "c"]);
    }

    #[test]
    fn test_remove_photo_out_of_range_is_noop() {
        let mut store = DraftStore::new();
        store.add_photo("a".into());
        store.add_photo("b".into());

        for index in [2, 3, 100, usize::MAX] {
            assert!(store.remove_photo(index).is_none());
            assert_eq!(store.draft().photos, vec!["a", "b"]);
        }

        let mut empty = DraftStore::new();
        assert!(empty.remove_photo(0).is_none());
        assert!(empty.draft().photos.is_empty());
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut store = DraftStore::new();
        store.set_location(GeoPoint::new(-6.2, 106.8).unwrap());
        store.add_photo("photo".into());
        store.set_notes(Some("behind the market".into()));
        store.set_ai_validation(classification());
        store.set_waste_type(Some(WasteType::Organic));
        store.set_waste_volume(Some(WasteVolume::LessThan1Kg));
        store.set_location_category(Some(LocationCategory::Park));

        store.reset();
        assert_eq!(store.snapshot(), ReportDraft::default());
    }

    #[test]
    fn test_ai_validation_is_set_once() {
        let mut store = DraftStore::new();
        assert!(store.set_ai_validation(classification()));

        let other = Classification {
            waste_type: WasteType::Organic,
            waste_volume: WasteVolume::LessThan1Kg,
            location_category: LocationCategory::Beach,
        };
        assert!(!store.set_ai_validation(other));
        assert_eq!(store.draft().ai_validation, Some(classification()));
    }

    #[test]
    fn test_effective_classification_prefers_ai() {
        let mut store = DraftStore::new();
        store.set_waste_type(Some(WasteType::Organic));
        store.set_location_category(Some(LocationCategory::Park));

        let manual = store.draft().effective_classification();
        assert_eq!(manual.waste_type, Some(WasteType::Organic));
        assert_eq!(manual.waste_volume, None);

        store.set_ai_validation(classification());
        let effective = store.draft().effective_classification();
        assert_eq!(effective.waste_type, Some(WasteType::Hazardous));
        assert_eq!(effective.waste_volume, Some(WasteVolume::SixToTenKg));
        assert_eq!(effective.location_category, Some(LocationCategory::Market));
    }

    #[test]
    fn test_blank_notes_are_dropped() {
        let mut store = DraftStore::new();
        store.set_notes(Some("   ".into()));
        assert!(store.draft().notes.is_none());
        store.set_notes(Some("two bags".into()));
        assert_eq!(store.draft().notes.as_deref(), Some("two bags"));
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let mut store = DraftStore::new();
        store.add_photo("a".into());
        let snapshot = store.snapshot();
        store.add_photo("b".into());
        assert_eq!(snapshot.photos.len(), 1);
        assert_eq!(store.draft().photos.len(), 2);
    }

    #[test]
    fn test_to_payload_carries_manual_fallbacks() {
        let mut store = DraftStore::new();
        store.set_location(GeoPoint::new(-6.2, 106.8).unwrap());
        store.add_photo("photo".into());
        store.set_waste_volume(Some(WasteVolume::MoreThan10Kg));

        let payload = store.draft().to_payload("user-1").unwrap();
        assert_eq!(payload.user_id, "user-1");
        assert_eq!(payload.latitude, -6.2);
        assert_eq!(payload.longitude, 106.8);
        assert_eq!(payload.photos, vec!["photo"]);
        assert_eq!(payload.waste_volume, Some(WasteVolume::MoreThan10Kg));
        assert_eq!(payload.status, ReportStatus::Pending);
    }

    #[test]
    fn test_to_payload_rejects_incomplete_draft() {
        let draft = ReportDraft::default();
        assert!(draft.to_payload("user-1").is_err());
        assert!(!draft.is_submittable());
    }
}
