//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: which
//! API to talk to, how long tokens live, how often the session is checked
//! and where tokens are kept.
//!
//! Configuration is stored at `~/.config/gatekeep/config.json`. The API URL
//! and key can be overridden with `GATEKEEP_API_URL` and `GATEKEEP_API_KEY`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::api::AuthClient;
use crate::auth::session::DEFAULT_REFRESH_LEAD_SECS;
use crate::auth::timer::DEFAULT_REFRESH_INTERVAL_SECS;
use crate::auth::tokens::{DEFAULT_ACCESS_MAX_AGE_SECS, DEFAULT_REFRESH_MAX_AGE_SECS};
use crate::auth::{
    FileBackend, KeyringBackend, MemoryBackend, SessionFile, SessionSettings, TokenBackend,
    TokenStore,
};

/// Application name used for config/data directory paths
const APP_NAME: &str = "gatekeep";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_API_URL: &str = "GATEKEEP_API_URL";
pub const ENV_API_KEY: &str = "GATEKEEP_API_KEY";

/// Keychain account holding the token pair
const KEYRING_ACCOUNT: &str = "session";

/// Where the token pair is kept between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    Memory,
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub access_token_max_age_secs: i64,
    pub refresh_token_max_age_secs: i64,
    pub refresh_interval_secs: u64,
    pub refresh_lead_secs: i64,
    pub request_timeout_secs: u64,
    pub token_storage: TokenStorage,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            access_token_max_age_secs: DEFAULT_ACCESS_MAX_AGE_SECS,
            refresh_token_max_age_secs: DEFAULT_REFRESH_MAX_AGE_SECS,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            refresh_lead_secs: DEFAULT_REFRESH_LEAD_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token_storage: TokenStorage::default(),
            last_username: None,
        }
    }
}

impl Config {
    /// Load from the user config directory, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config in {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `GATEKEEP_*` overrides. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |key: &str| lookup(key).filter(|v: &String| !v.trim().is_empty());
        if let Some(url) = set(ENV_API_URL) {
            self.api_url = Some(url);
        }
        if let Some(key) = set(ENV_API_KEY) {
            self.api_key = Some(key);
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for persisted tokens and session flags.
    pub fn state_dir(&self) -> Result<PathBuf> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    // ===== Builders =====

    pub fn build_client(&self) -> Result<AuthClient> {
        let api_url = self
            .api_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("No API URL configured (set {} or api_url)", ENV_API_URL)
            })?;
        let client = AuthClient::with_timeout(
            api_url,
            self.api_key.clone().unwrap_or_default(),
            Duration::from_secs(self.request_timeout_secs),
        )?;
        Ok(client)
    }

    pub fn token_backend(&self, state_dir: &Path) -> Box<dyn TokenBackend> {
        match self.token_storage {
            TokenStorage::Memory => Box::new(MemoryBackend::new()),
            TokenStorage::File => Box::new(FileBackend::new(state_dir.to_path_buf())),
            TokenStorage::Keyring => Box::new(KeyringBackend::new(KEYRING_ACCOUNT)),
        }
    }

    pub fn build_token_store(&self, state_dir: &Path) -> TokenStore {
        TokenStore::open(
            self.token_backend(state_dir),
            chrono::Duration::seconds(self.access_token_max_age_secs),
            chrono::Duration::seconds(self.refresh_token_max_age_secs),
        )
    }

    /// Session flags follow the tokens: kept on disk unless tokens are not.
    pub fn session_file(&self, state_dir: &Path) -> SessionFile {
        match self.token_storage {
            TokenStorage::Memory => SessionFile::ephemeral(),
            TokenStorage::File | TokenStorage::Keyring => {
                SessionFile::new(state_dir.to_path_buf())
            }
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs.max(1)),
            refresh_lead: chrono::Duration::seconds(self.refresh_lead_secs.max(0)),
        }
    }
}
