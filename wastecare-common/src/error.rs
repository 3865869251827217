//! Workspace error type for Waste Care
//!
//! Backend calls have their own taxonomy in [`crate::backend::BackendError`];
//! this type covers local storage, configuration and input problems.

use thiserror::Error;

/// Result alias used across the Waste Care crates
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Local relational store failure (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O failure while reading configuration or assets
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Missing or unusable configuration (credentials, URLs)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied an invalid value
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
