//! Persistence backends for the token pair.
//!
//! Each token is stored with its own expiry so that an entry past its
//! max-age reads as absent, the way an expired cookie would.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token file name in the state directory
const TOKENS_FILE: &str = "tokens.json";

/// Keychain service name for the keyring backend
pub const KEYRING_SERVICE: &str = "gatekeep";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Token storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token storage is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// The value if the token is still live at `now`.
    pub fn live_value(&self, now: DateTime<Utc>) -> Option<&str> {
        if self.is_expired_at(now) || self.value.is_empty() {
            None
        } else {
            Some(&self.value)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: Option<StoredToken>,
    pub refresh_token: Option<StoredToken>,
}

impl StoredTokens {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Where the token pair lives between runs.
pub trait TokenBackend: Send + Sync {
    fn load(&self) -> Result<StoredTokens, StorageError>;
    fn save(&self, tokens: &StoredTokens) -> Result<(), StorageError>;
    /// Remove stored tokens. Succeeds when nothing is stored.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Process-local storage; nothing survives a restart.
#[derive(Default)]
pub struct MemoryBackend {
    tokens: Mutex<StoredTokens>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenBackend for MemoryBackend {
    fn load(&self) -> Result<StoredTokens, StorageError> {
        Ok(self.tokens.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, tokens: &StoredTokens) -> Result<(), StorageError> {
        *self.tokens.lock().unwrap_or_else(|e| e.into_inner()) = tokens.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.tokens.lock().unwrap_or_else(|e| e.into_inner()) = StoredTokens::default();
        Ok(())
    }
}

/// JSON file in the state directory.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(state_dir: PathBuf) -> Self {
        Self {
            path: state_dir.join(TOKENS_FILE),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl TokenBackend for FileBackend {
    fn load(&self) -> Result<StoredTokens, StorageError> {
        if !self.path.exists() {
            return Ok(StoredTokens::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, tokens: &StoredTokens) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(tokens)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// OS keychain entry holding the serialized pair.
pub struct KeyringBackend {
    account: String,
}

impl KeyringBackend {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry, StorageError> {
        Ok(Entry::new(KEYRING_SERVICE, &self.account)?)
    }
}

impl TokenBackend for KeyringBackend {
    fn load(&self) -> Result<StoredTokens, StorageError> {
        match self.entry()?.get_password() {
            Ok(secret) => Ok(serde_json::from_str(&secret)?),
            Err(keyring::Error::NoEntry) => Ok(StoredTokens::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, tokens: &StoredTokens) -> Result<(), StorageError> {
        let secret = serde_json::to_string(tokens)?;
        self.entry()?.set_password(&secret)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
