//! Leaderboard shaping and aggregate statistics
//!
//! The backend returns unranked profile rows; ranking happens client-side so
//! the local store and the hosted backend produce identical boards.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;

use crate::backend::{BackendError, BackendResult, PersistenceService};
use crate::models::{ProvinceStat, WasteDistribution};

/// Profile row as returned by `get_leaderboard`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub user_id: String,
    pub full_name: Option<String>,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    pub full_name: Option<String>,
    pub exp: i64,
}

/// Order by experience (descending) and assign dense ranks from 1
///
/// Equal experience shares a rank; ties are listed by name, then id, so the
/// order is stable across calls.
pub fn rank(mut rows: Vec<ProfileRow>) -> Vec<LeaderboardEntry> {
    rows.sort_by(|a, b| {
        b.exp
            .cmp(&a.exp)
            .then_with(|| compare_names(&a.full_name, &b.full_name))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    let mut entries = Vec::with_capacity(rows.len());
    let mut rank = 0u32;
    let mut previous_exp = None;
    for row in rows {
        if previous_exp != Some(row.exp) {
            rank += 1;
            previous_exp = Some(row.exp);
        }
        entries.push(LeaderboardEntry {
            rank,
            user_id: row.user_id,
            full_name: row.full_name,
            exp: row.exp,
        });
    }
    entries
}

// Named users first, alphabetically
fn compare_names(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn decode_rows<T: for<'de> Deserialize<'de>>(value: Value) -> BackendResult<Vec<T>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value).map_err(|e| BackendError::Decode(e.to_string()))
}

/// Top `limit` users, ranked
pub async fn fetch_leaderboard(
    backend: &dyn PersistenceService,
    limit: u32,
) -> BackendResult<Vec<LeaderboardEntry>> {
    let rows = backend
        .rpc("get_leaderboard", json!({ "limit": limit }))
        .await?;
    Ok(rank(decode_rows(rows)?))
}

pub async fn fetch_province_stats(
    backend: &dyn PersistenceService,
) -> BackendResult<Vec<ProvinceStat>> {
    decode_rows(backend.rpc("get_province_stats", json!({})).await?)
}

pub async fn fetch_waste_distribution(
    backend: &dyn PersistenceService,
) -> BackendResult<Vec<WasteDistribution>> {
    decode_rows(backend.rpc("get_waste_distribution", json!({})).await?)
}
