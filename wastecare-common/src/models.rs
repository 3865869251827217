//! Domain models shared by the report pipeline, the backends and the HTTP API

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Location
// ============================================================================

/// Rejected coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeoError {
    #[error("coordinates must be finite numbers")]
    NonFinite,

    #[error("latitude {0} outside -90..=90")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} outside -180..=180")]
    LongitudeOutOfRange(f64),
}

/// Geographic position of a reported site
///
/// Only constructible through [`GeoPoint::new`], so every value held by a
/// draft is finite and inside the valid ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(GeoError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::LongitudeOutOfRange(longitude));
        }
        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

// ============================================================================
// Classification
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasteType {
    Organic,
    Inorganic,
    Hazardous,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WasteVolume {
    #[serde(rename = "less_than_1kg")]
    LessThan1Kg,
    #[serde(rename = "1_to_5kg")]
    OneToFiveKg,
    #[serde(rename = "6_to_10kg")]
    SixToTenKg,
    #[serde(rename = "more_than_10kg")]
    MoreThan10Kg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationCategory {
    River,
    Roadside,
    Park,
    Residential,
    Market,
    Beach,
    Other,
}

/// Server-assigned classification of a reported site
///
/// All three fields are required: a classification is either complete or
/// absent, never partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub waste_type: WasteType,
    pub waste_volume: WasteVolume,
    pub location_category: LocationCategory,
}

// ============================================================================
// Persistence payloads
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Cleaned,
}

/// Record sent to the persistence collaborator when creating a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub photos: Vec<String>,
    pub notes: Option<String>,
    pub waste_type: Option<WasteType>,
    pub waste_volume: Option<WasteVolume>,
    pub location_category: Option<LocationCategory>,
    pub status: ReportStatus,
}

/// Outcome a user records when revisiting a reported site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevalidationStatus {
    Clean,
    StillDirty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevalidationPayload {
    pub report_id: String,
    pub user_id: String,
    pub status: RevalidationStatus,
    pub photo: Option<String>,
    pub notes: Option<String>,
}

/// Identifier of a record created by the persistence collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub id: String,
}

// ============================================================================
// Users & sessions
// ============================================================================

/// Public view of a user account
///
/// Serialised with `fullName` to match the leaderboard HTTP contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpData {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: UserSummary,
}

/// Selection of users for `list_users`; an empty id list selects everyone
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub ids: Vec<String>,
}

impl UserFilter {
    pub fn by_ids(ids: Vec<String>) -> Self {
        Self { ids }
    }

    pub fn matches(&self, user_id: &str) -> bool {
        self.ids.is_empty() || self.ids.iter().any(|id| id == user_id)
    }
}

// ============================================================================
// Aggregates
// ============================================================================

/// Per-province report totals returned by the `get_province_stats` function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvinceStat {
    pub province: String,
    pub total_reports: i64,
    pub cleaned_reports: i64,
}

/// Report count per waste type returned by `get_waste_distribution`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteDistribution {
    pub waste_type: Option<WasteType>,
    pub total: i64,
}
