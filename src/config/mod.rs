/// MyJKKN API configuration, key validation and the persisted config store
pub mod api;

/// Application settings loaded from config.toml and the environment
pub mod app;

/// Database configuration and connection management
pub mod database;

pub use api::{ApiConfig, ApiConfigStore, validate_api_key};
pub use app::{AppConfig, load_default_config};
