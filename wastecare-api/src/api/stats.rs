//! Aggregate statistics

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use wastecare_common::leaderboard::{fetch_province_stats, fetch_waste_distribution};
use wastecare_common::models::{ProvinceStat, WasteDistribution};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ProvinceStatsResponse {
    pub provinces: Vec<ProvinceStat>,
}

#[derive(Debug, Serialize)]
pub struct WasteDistributionResponse {
    pub distribution: Vec<WasteDistribution>,
}

/// GET /stats/provinces
pub async fn province_stats(State(state): State<AppState>) -> ApiResult<Json<ProvinceStatsResponse>> {
    let provinces = fetch_province_stats(state.persistence()?.as_ref()).await?;
    Ok(Json(ProvinceStatsResponse { provinces }))
}

/// GET /stats/waste
pub async fn waste_distribution(
    State(state): State<AppState>,
) -> ApiResult<Json<WasteDistributionResponse>> {
    let distribution = fetch_waste_distribution(state.persistence()?.as_ref()).await?;
    Ok(Json(WasteDistributionResponse { distribution }))
}
