//! # Waste Care Common Library
//!
//! Shared code for the Waste Care crates including:
//! - Domain models (locations, classifications, report payloads)
//! - Backend collaborator traits and their clients
//! - Event types (WasteCareEvent) and the EventBus
//! - Configuration loading
//! - Experience point policy and leaderboard shaping

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod experience;
pub mod leaderboard;
pub mod models;

pub use error::{Error, Result};
pub use experience::{ExperienceAction, ExperienceAwarder};
pub use models::{Classification, GeoPoint};
