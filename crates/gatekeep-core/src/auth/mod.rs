//! Authentication module for the console's client-side session.
//!
//! This module provides:
//! - `Session`: login/logout/refresh state machine with a background refresh timer
//! - `TokenStore`: access/refresh tokens with independent expiries
//! - `UserStore`: the signed-in user's profile
//! - Token backends: in-memory, JSON file, or OS keychain
//!
//! Access tokens live for an hour and refresh tokens for six by default;
//! the session refreshes proactively shortly before the access token expires.

pub mod persist;
pub mod session;
pub mod storage;
pub mod timer;
pub mod tokens;
pub mod user;

pub use persist::{PersistedSession, SessionFile};
pub use session::{
    AuthOutcome, Phase, RefreshOutcome, Session, SessionBuilder, SessionEvent, SessionSettings,
};
pub use storage::{FileBackend, KeyringBackend, MemoryBackend, StorageError, TokenBackend};
pub use tokens::{TokenPair, TokenStore};
pub use user::UserStore;
