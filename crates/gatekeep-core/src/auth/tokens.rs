use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::storage::{MemoryBackend, StorageError, StoredToken, StoredTokens, TokenBackend};

/// Default access token lifetime (1 hour).
pub const DEFAULT_ACCESS_MAX_AGE_SECS: i64 = 60 * 60;

/// Default refresh token lifetime (6 hours).
pub const DEFAULT_REFRESH_MAX_AGE_SECS: i64 = 6 * 60 * 60;

/// An access/refresh token pair as issued by the auth API.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Both halves carry a value.
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Access and refresh tokens with independent max-ages.
///
/// The in-memory copy is authoritative; every mutation is written through to
/// the backend. A backend failure is reported to the caller but never leaves
/// memory and caller out of step.
pub struct TokenStore {
    backend: Box<dyn TokenBackend>,
    access_max_age: Duration,
    refresh_max_age: Duration,
    current: Mutex<StoredTokens>,
}

impl TokenStore {
    /// Open a store over `backend`, loading whatever it holds.
    pub fn open(
        backend: Box<dyn TokenBackend>,
        access_max_age: Duration,
        refresh_max_age: Duration,
    ) -> Self {
        let current = match backend.load() {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Failed to load stored tokens, starting empty");
                StoredTokens::default()
            }
        };

        Self {
            backend,
            access_max_age,
            refresh_max_age,
            current: Mutex::new(current),
        }
    }

    /// Non-persistent store with the default max-ages.
    pub fn in_memory() -> Self {
        Self::open(
            Box::new(MemoryBackend::new()),
            Duration::seconds(DEFAULT_ACCESS_MAX_AGE_SECS),
            Duration::seconds(DEFAULT_REFRESH_MAX_AGE_SECS),
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoredTokens> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current `(access, refresh)` values; expired entries read as `None`.
    pub fn get(&self) -> (Option<String>, Option<String>) {
        let now = Utc::now();
        let current = self.lock();
        let live = |token: &Option<StoredToken>| {
            token
                .as_ref()
                .and_then(|t| t.live_value(now))
                .map(str::to_string)
        };
        (live(&current.access_token), live(&current.refresh_token))
    }

    pub fn access_token(&self) -> Option<String> {
        self.get().0
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get().1
    }

    /// The pair, only when both tokens are live.
    pub fn pair(&self) -> Option<TokenPair> {
        match self.get() {
            (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
            _ => None,
        }
    }

    pub fn has_pair(&self) -> bool {
        self.pair().is_some()
    }

    /// When the stored access token stops being usable.
    pub fn access_expires_at(&self) -> Option<DateTime<Utc>> {
        self.lock().access_token.as_ref().map(|t| t.expires_at)
    }

    /// Replace both tokens together, restarting both max-ages.
    pub fn set(&self, pair: &TokenPair) -> Result<(), StorageError> {
        let now = Utc::now();
        let tokens = StoredTokens {
            access_token: Some(StoredToken {
                value: pair.access_token.clone(),
                expires_at: now + self.access_max_age,
            }),
            refresh_token: Some(StoredToken {
                value: pair.refresh_token.clone(),
                expires_at: now + self.refresh_max_age,
            }),
        };

        let mut current = self.lock();
        *current = tokens;
        debug!(access_max_age_secs = self.access_max_age.num_seconds(), "Tokens stored");
        self.backend.save(&current)
    }

    /// Remove both tokens. Safe to call when already empty.
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut current = self.lock();
        *current = StoredTokens::default();
        self.backend.clear()
    }
}
