//! MyJKKN API configuration and its persisted store.
//!
//! The configuration (`apiKey`, `mockMode`, `proxyMode`, `baseUrl`, `proxyUrl`) lives in
//! a small JSON file stored under the `myjkkn_api_config` name. [`ApiConfigStore`] keeps
//! the current value in a `tokio::sync::watch` channel so that long-lived listeners (the
//! directory refetchers) learn about changes made elsewhere in the process, and
//! [`ApiConfigStore::reload`] picks up edits made to the file by another process.

use crate::errors::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Storage key (and default file stem) of the persisted configuration.
pub const API_CONFIG_KEY: &str = "myjkkn_api_config";

/// Default upstream host for the MyJKKN administrative API.
pub const DEFAULT_BASE_URL: &str = "https://myadmin.jkkn.ac.in/api";

/// Default local proxy path served by this crate's binary.
pub const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:8080/api/myjkkn";

#[allow(clippy::expect_used)] // Literal pattern, checked by tests
static API_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:jk|jkkn)_[A-Za-z0-9]+_[A-Za-z0-9]+$").expect("API key pattern is valid")
});

/// Returns true if `key` has the `jk_<id>_<secret>` or `jkkn_<id>_<secret>` shape.
#[must_use]
pub fn validate_api_key(key: &str) -> bool {
    API_KEY_PATTERN.is_match(key)
}

/// Runtime configuration for the MyJKKN client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Bearer token sent to the API
    #[serde(default)]
    pub api_key: String,
    /// Legacy switch for synthetic data; every request fails while it is on
    #[serde(default)]
    pub mock_mode: bool,
    /// Route requests through the local proxy path instead of the upstream host
    #[serde(default)]
    pub proxy_mode: bool,
    /// Upstream base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Local proxy base URL used when `proxy_mode` is on
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_proxy_url() -> String {
    DEFAULT_PROXY_URL.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            mock_mode: false,
            proxy_mode: false,
            base_url: default_base_url(),
            proxy_url: default_proxy_url(),
        }
    }
}

impl ApiConfig {
    /// Key with the secret part hidden, safe to log.
    #[must_use]
    pub fn masked_key(&self) -> String {
        if self.api_key.is_empty() {
            return "<unset>".to_string();
        }
        match self.api_key.rsplit_once('_') {
            Some((prefix, _)) => format!("{prefix}_****"),
            None => "****".to_string(),
        }
    }
}

/// Persisted, observable holder of the current [`ApiConfig`].
#[derive(Debug)]
pub struct ApiConfigStore {
    path: Option<PathBuf>,
    sender: watch::Sender<ApiConfig>,
}

impl ApiConfigStore {
    /// Opens the store backed by `path`. A missing file yields the default config.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self> {
        let config = read_config_file(path)?.unwrap_or_default();
        info!(
            "Loaded MyJKKN API config from {:?} (key {}, proxy_mode={}, mock_mode={})",
            path,
            config.masked_key(),
            config.proxy_mode,
            config.mock_mode
        );
        let (sender, _) = watch::channel(config);
        Ok(Self {
            path: Some(path.to_path_buf()),
            sender,
        })
    }

    /// Store that is never written to disk. Used by tests and embedded callers.
    #[must_use]
    pub fn in_memory(config: ApiConfig) -> Self {
        let (sender, _) = watch::channel(config);
        Self { path: None, sender }
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn current(&self) -> ApiConfig {
        self.sender.borrow().clone()
    }

    /// Receiver that is notified every time the configuration is saved or reloaded.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ApiConfig> {
        self.sender.subscribe()
    }

    /// Applies `change`, persists the result and notifies subscribers.
    pub fn update(&self, change: impl FnOnce(&mut ApiConfig)) -> Result<ApiConfig> {
        let mut next = self.current();
        change(&mut next);
        if let Some(path) = &self.path {
            write_config_file(path, &next)?;
        }
        debug!("MyJKKN API config changed (key {})", next.masked_key());
        self.sender.send_replace(next.clone());
        Ok(next)
    }

    /// Re-reads the backing file. Returns true (and notifies) if it differed.
    pub fn reload(&self) -> Result<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        let on_disk = read_config_file(path)?.unwrap_or_default();
        let changed = self.sender.send_if_modified(|current| {
            if *current == on_disk {
                false
            } else {
                *current = on_disk;
                true
            }
        });
        if changed {
            info!("MyJKKN API config reloaded from {:?}", path);
        }
        Ok(changed)
    }

    /// Polls the backing file every `interval` and reloads it when it changes.
    pub fn spawn_file_watcher(
        self: Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.reload() {
                    warn!("Failed to reload MyJKKN API config: {e}");
                }
            }
        })
    }
}

fn read_config_file(path: &Path) -> Result<Option<ApiConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read API config {}: {e}", path.display()),
    })?;
    let config = serde_json::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse API config {}: {e}", path.display()),
    })?;
    Ok(Some(config))
}

fn write_config_file(path: &Path, config: &ApiConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(config)?)?;
    Ok(())
}
