//! gatekeep-core: client-side session handling for the admin console.
//!
//! This crate provides:
//! - `api`: HTTP client for the login, logout and refresh-token endpoints
//! - `auth`: token storage, the session state machine and its refresh timer
//! - `nav`: route guard, router, breadcrumbs and menus
//! - `notify`: user-facing notifications
//! - `config`: application configuration
//! - `app`: the pieces wired together for a front end
//!
//! Front ends own an `App` (or a `Session` and `Router` directly) and render
//! whatever notifications the session emits.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod nav;
pub mod notify;

pub use api::{ApiError, AuthClient, Credentials, CredentialTransport};
pub use app::App;
pub use auth::{AuthOutcome, Phase, RefreshOutcome, Session, SessionEvent, TokenPair, TokenStore};
pub use config::{Config, TokenStorage};
pub use nav::{GuardDecision, NavigationError, RouteGuard, Router};
pub use notify::{ChannelSink, LogSink, Notification, NotificationSink, Severity};
