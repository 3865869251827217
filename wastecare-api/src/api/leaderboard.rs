//! Leaderboard endpoints
//!
//! `POST /leaderboard/users` resolves profile ids to directory entries so the
//! leaderboard page can show names and emails; the directory listing needs
//! service credentials and therefore runs server-side.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use wastecare_common::leaderboard::{fetch_leaderboard, LeaderboardEntry};
use wastecare_common::models::{UserFilter, UserSummary};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersRequest {
    pub user_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<UserSummary>,
}

/// POST /leaderboard/users
pub async fn lookup_users(
    State(state): State<AppState>,
    body: Result<Json<UsersRequest>, JsonRejection>,
) -> ApiResult<Json<UsersResponse>> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let directory = state.directory()?;

    // An empty filter would list everyone
    if request.user_ids.is_empty() {
        return Ok(Json(UsersResponse { users: Vec::new() }));
    }

    let requested = request.user_ids.len();
    let users = directory
        .list_users(&UserFilter::by_ids(request.user_ids))
        .await?;
    tracing::debug!(requested, found = users.len(), "Resolved leaderboard users");

    Ok(Json(UsersResponse { users }))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
}

/// GET /leaderboard?limit=N
pub async fn get_leaderboard(
    State(state): State<AppState>,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> ApiResult<Json<LeaderboardResponse>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let entries = fetch_leaderboard(state.persistence()?.as_ref(), limit).await?;
    Ok(Json(LeaderboardResponse { entries }))
}
