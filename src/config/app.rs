//! Application configuration loading from config.toml
//!
//! The TOML file carries deployment settings (database URL, bind address, where the
//! MyJKKN API config is persisted, cache TTLs). Environment variables loaded from `.env`
//! override the file so secrets and per-host values never need to be committed.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/jkkn_portal.sqlite?mode=rwc";
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// `SeaORM` connection URL (`sqlite://...` or `postgres://...`)
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Address the HTTP surface listens on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Location of the persisted MyJKKN API configuration
    #[serde(default = "default_api_config_path")]
    pub api_config_path: PathBuf,
    /// Browser origins allowed to call the HTTP surface. Empty means same-origin only.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Notification cache settings
    #[serde(default)]
    pub notifications: NotificationSettings,
    /// MyJKKN client settings
    #[serde(default)]
    pub myjkkn: MyJkknSettings,
}

/// `[notifications]` table
#[derive(Debug, Deserialize, Clone)]
pub struct NotificationSettings {
    /// How long a cached notification list stays fresh
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

/// `[myjkkn]` table
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MyJkknSettings {
    /// Overrides the persisted base URL when the store has never been saved
    pub base_url: Option<String>,
    /// Overrides the persisted proxy URL when the store has never been saved
    pub proxy_url: Option<String>,
    /// Fail on unrecognised nested shapes instead of emitting `"N/A"`
    #[serde(default)]
    pub strict_normalization: bool,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_api_config_path() -> PathBuf {
    PathBuf::from(format!("data/{}.json", super::api::API_CONFIG_KEY))
}

const fn default_ttl_seconds() -> u64 {
    30
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            bind_address: default_bind_address(),
            api_config_path: default_api_config_path(),
            cors_origins: Vec::new(),
            notifications: NotificationSettings::default(),
            myjkkn: MyJkknSettings::default(),
        }
    }
}

impl AppConfig {
    /// Notification cache TTL as a `Duration`.
    #[must_use]
    pub const fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.notifications.ttl_seconds)
    }

    /// Applies `DATABASE_URL`, `JKKN_BIND_ADDRESS` and `JKKN_CORS_ORIGINS` from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(addr) = std::env::var("JKKN_BIND_ADDRESS") {
            self.bind_address = addr;
        }
        if let Ok(origins) = std::env::var("JKKN_CORS_ORIGINS") {
            self.cors_origins = parse_origin_list(&origins);
        }
    }
}

/// Splits a comma-separated origin list, dropping blanks.
fn parse_origin_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

/// API key supplied through `MYJKKN_API_KEY`, if any.
#[must_use]
pub fn env_api_key() -> Option<String> {
    std::env::var("MYJKKN_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
}

/// Loads application configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads ./config.toml if present, otherwise the defaults, then applies env overrides.
pub fn load_default_config() -> Result<AppConfig> {
    let path = Path::new("config.toml");
    let mut config = if path.exists() {
        load_config(path)?
    } else {
        tracing::info!("No config.toml found, using built-in defaults");
        AppConfig::default()
    };
    config.apply_env_overrides();
    Ok(config)
}
