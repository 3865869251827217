//! HTTP API handlers for wastecare-api

pub mod health;
pub mod leaderboard;
pub mod stats;

pub use health::health_routes;
pub use leaderboard::{get_leaderboard, lookup_users};
pub use stats::{province_stats, waste_distribution};
