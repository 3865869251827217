//! Configuration loading
//!
//! Bootstrap configuration comes from a TOML file; backend credentials may be
//! overridden from the environment. Priority order:
//! 1. Command-line argument (config path, port)
//! 2. Environment variables (`WASTECARE_*`)
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: the service starts with defaults.
//! `load_config` runs before the log subscriber exists, so it records how the
//! configuration was resolved and `LoadedConfig::log_resolution` reports it
//! once tracing is up.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ENV_CONFIG_PATH: &str = "WASTECARE_CONFIG";
pub const ENV_BACKEND_URL: &str = "WASTECARE_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "WASTECARE_ANON_KEY";
pub const ENV_SERVICE_ROLE_KEY: &str = "WASTECARE_SERVICE_ROLE_KEY";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Local SQLite store (used when no hosted backend is configured)
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Hosted backend endpoint and keys
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    /// Privileged key; required for the user directory
    pub service_role_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Credentials for privileged (server-side) backend calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCredentials {
    pub url: String,
    pub service_role_key: String,
}

impl BackendConfig {
    /// Overlay `WASTECARE_*` environment variables on top of TOML values
    ///
    /// Returns the variables that replaced a value already set in TOML.
    pub fn apply_env(&mut self) -> Vec<&'static str> {
        let mut replaced = Vec::new();
        let mut overlay = |slot: &mut Option<String>, var: &'static str| {
            if let Ok(value) = std::env::var(var) {
                if is_valid_key(&value) {
                    if slot.is_some() {
                        replaced.push(var);
                    }
                    *slot = Some(value);
                }
            }
        };
        overlay(&mut self.url, ENV_BACKEND_URL);
        overlay(&mut self.anon_key, ENV_ANON_KEY);
        overlay(&mut self.service_role_key, ENV_SERVICE_ROLE_KEY);
        replaced
    }

    /// URL and anonymous key are present
    pub fn is_configured(&self) -> bool {
        valid(&self.url).is_some() && valid(&self.anon_key).is_some()
    }

    /// URL and service role key, or a configuration error naming what is missing
    pub fn require_service_role(&self) -> Result<ServiceCredentials> {
        let url = valid(&self.url).ok_or_else(|| {
            Error::Config(format!(
                "backend URL not configured (set [backend].url or {})",
                ENV_BACKEND_URL
            ))
        })?;
        let service_role_key = valid(&self.service_role_key).ok_or_else(|| {
            Error::Config(format!(
                "service role key not configured (set [backend].service_role_key or {})",
                ENV_SERVICE_ROLE_KEY
            ))
        })?;
        Ok(ServiceCredentials {
            url: url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        })
    }
}

fn valid(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| is_valid_key(v))
}

/// Non-empty, non-whitespace
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Locate the TOML config file
///
/// CLI argument, then `WASTECARE_CONFIG`, then the platform config directory
/// (`~/.config/wastecare/config.toml` on Linux). Only the platform default is
/// checked for existence; explicit paths are returned as given.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        if is_valid_key(&path) {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("wastecare").join("config.toml"))
        .filter(|p| p.exists())
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// A path was given or resolved but nothing exists there
    Missing(PathBuf),
    /// No path given and no platform default present
    Defaults,
}

/// Configuration plus a record of how it was resolved
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    pub source: ConfigSource,
    /// Environment variables that replaced a TOML value
    pub env_overrides: Vec<&'static str>,
}

impl LoadedConfig {
    /// Log the resolution; call after the tracing subscriber is installed
    pub fn log_resolution(&self) {
        match &self.source {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Missing(path) => warn!(
                "Config file not found at {}, using defaults",
                path.display()
            ),
            ConfigSource::Defaults => warn!("No config file found, using defaults"),
        }
        for var in &self.env_overrides {
            info!("{} overrides value from TOML config", var);
        }
    }
}

/// Load configuration with environment overrides applied
///
/// Emits no log output; see `LoadedConfig::log_resolution`.
pub fn load_config(cli_arg: Option<&Path>) -> Result<LoadedConfig> {
    let (mut config, source) = match resolve_config_path(cli_arg) {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            let config: TomlConfig = toml::from_str(&content)?;
            (config, ConfigSource::File(path))
        }
        Some(path) => (TomlConfig::default(), ConfigSource::Missing(path)),
        None => (TomlConfig::default(), ConfigSource::Defaults),
    };

    let env_overrides = config.backend.apply_env();
    Ok(LoadedConfig {
        config,
        source,
        env_overrides,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5780);
        assert_eq!(config.logging.level, "info");
        assert!(!config.backend.is_configured());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [backend]
            url = "https://example.supabase.co/"
            anon_key = "anon"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.backend.is_configured());
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_require_service_role_reports_missing_key() {
        let backend = BackendConfig {
            url: Some("https://example.supabase.co/".to_string()),
            anon_key: Some("anon".to_string()),
            service_role_key: Some("   ".to_string()),
        };
        match backend.require_service_role() {
            Err(Error::Config(msg)) => assert!(msg.contains("service role key")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_require_service_role_trims_trailing_slash() {
        let backend = BackendConfig {
            url: Some("https://example.supabase.co/".to_string()),
            anon_key: None,
            service_role_key: Some("secret".to_string()),
        };
        let creds = backend.require_service_role().unwrap();
        assert_eq!(creds.url, "https://example.supabase.co");
        assert_eq!(creds.service_role_key, "secret");
    }
}
