//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! backend base URL, the guarded path prefix, timeouts, where session state
//! is kept, and the last email used to sign in.
//!
//! Configuration is stored at `~/.config/civicdesk/config.json`. A few
//! fields can be overridden from the environment (see [`Config::apply_env`]).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::guard::{AuthGuard, DEFAULT_PROTECTED_PREFIX, DEFAULT_PUBLIC_PATH};
use crate::storage::{FileStorage, KeyringStorage, SharedStorage};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "civicdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

/// Seconds allowed for the silent profile fetch on each navigation
const DEFAULT_PROFILE_TIMEOUT_SECS: u64 = 10;

pub const ENV_BASE_URL: &str = "CIVICDESK_BASE_URL";
pub const ENV_STORAGE: &str = "CIVICDESK_STORAGE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Plain files in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub protected_prefix: String,
    pub public_path: String,
    pub request_timeout_secs: u64,
    pub profile_timeout_secs: u64,
    pub storage: StorageKind,
    /// Overrides the session directory (defaults to the cache dir)
    pub session_dir: Option<PathBuf>,
    /// When set, logs are also written here with daily rotation
    pub log_dir: Option<PathBuf>,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            protected_prefix: DEFAULT_PROTECTED_PREFIX.to_string(),
            public_path: DEFAULT_PUBLIC_PATH.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            profile_timeout_secs: DEFAULT_PROFILE_TIMEOUT_SECS,
            storage: StorageKind::default(),
            session_dir: None,
            log_dir: None,
            last_email: None,
        }
    }
}

impl Config {
    /// Load the config file and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env();
        debug!(base_url = %config.base_url, storage = ?config.storage, "Config loaded");
        Ok(config)
    }

    /// Load the config file as stored, without environment overrides.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Self::from_json(&contents)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would lock every run out of its session.
    pub fn validate(&self) -> Result<()> {
        // A zero timeout fails every profile fetch, and a failed fetch logs out
        if self.profile_timeout_secs == 0 {
            bail!("profile_timeout_secs must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        if AuthGuard::from_config(self).redirects_into_protected() {
            bail!(
                "public_path {} lies under protected_prefix {}",
                self.public_path,
                self.protected_prefix
            );
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `CIVICDESK_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        match lookup(ENV_STORAGE).as_deref() {
            Some("file") => self.storage = StorageKind::File,
            Some("keyring") => self.storage = StorageKind::Keyring,
            _ => {}
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn session_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.session_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn profile_timeout(&self) -> Duration {
        Duration::from_secs(self.profile_timeout_secs)
    }

    /// Open the configured session storage backend.
    pub fn open_storage(&self) -> Result<SharedStorage> {
        let storage: SharedStorage = match self.storage {
            StorageKind::File => Arc::new(FileStorage::new(self.session_dir()?)),
            StorageKind::Keyring => Arc::new(KeyringStorage::new()),
        };
        Ok(storage)
    }
}
