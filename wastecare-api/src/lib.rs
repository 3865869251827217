//! wastecare-api - HTTP surface for Waste Care
//!
//! Serves the user-directory lookup used by the leaderboard page plus
//! read-only leaderboard and statistics endpoints.

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use wastecare_common::backend::{AuthService, PersistenceService};

pub mod api;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
///
/// Collaborators are optional: without backend configuration the server
/// still starts and the affected endpoints answer 500.
#[derive(Clone, Default)]
pub struct AppState {
    /// User directory (admin listing of auth users)
    pub directory: Option<Arc<dyn AuthService>>,
    /// Remote procedures for leaderboard and statistics
    pub persistence: Option<Arc<dyn PersistenceService>>,
}

impl AppState {
    pub fn new(
        directory: Option<Arc<dyn AuthService>>,
        persistence: Option<Arc<dyn PersistenceService>>,
    ) -> Self {
        Self {
            directory,
            persistence,
        }
    }

    pub(crate) fn directory(&self) -> ApiResult<&Arc<dyn AuthService>> {
        self.directory.as_ref().ok_or_else(|| {
            ApiError::NotConfigured("user directory is not configured".to_string())
        })
    }

    pub(crate) fn persistence(&self) -> ApiResult<&Arc<dyn PersistenceService>> {
        self.persistence
            .as_ref()
            .ok_or_else(|| ApiError::NotConfigured("backend is not configured".to_string()))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/leaderboard", get(api::get_leaderboard))
        .route("/leaderboard/users", post(api::lookup_users))
        .route("/stats/provinces", get(api::province_stats))
        .route("/stats/waste", get(api::waste_distribution))
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the HTTP listener
///
/// Returns the address actually bound, which differs from `addr` when port 0
/// asks the OS to choose.
pub async fn bind_listener(addr: SocketAddr) -> std::io::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(addr).await?;
    let bound = listener.local_addr()?;
    Ok((listener, bound))
}
