//! Session state machine: login, logout and token reconciliation.
//!
//! A `Session` is constructed once at startup and shared by cheap clone.
//! Operations never fail outward: transport errors are converted into a
//! single notification and an outcome value, and the caller decides where
//! to navigate.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::{debug, info, warn};

use crate::api::{ApiError, Credentials, CredentialTransport};
use crate::notify::{LogSink, Notification, NotificationSink, DEFAULT_ERROR_DETAIL};

use super::persist::{PersistedSession, SessionFile};
use super::timer::{RefreshTimer, DEFAULT_REFRESH_INTERVAL_SECS};
use super::tokens::{TokenPair, TokenStore};
use super::user::UserStore;

// ============================================================================
// Constants
// ============================================================================

/// Refresh the access token once it is this close to expiring.
pub const DEFAULT_REFRESH_LEAD_SECS: i64 = 5 * 60;

/// Buffer size for the session event channel.
const EVENT_BUFFER_SIZE: usize = 16;

const SIGNED_OUT_DETAIL: &str = "You have been signed out.";

// ============================================================================
// Public Types
// ============================================================================

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    LoggedOut,
    LoggingIn,
    LoggedIn,
    Refreshing,
    LoggingOut,
}

/// Result of `login` and `logout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Success,
    /// The server refused the request (bad credentials and the like)
    Rejected,
    /// Network, server or response failure
    Failed,
    /// Another operation was already in flight; nothing was done
    Busy,
}

/// Result of `check_and_refresh_tokens`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Tokens present and not close to expiry
    Valid,
    Refreshed,
    /// Local state was cleared; the caller should send the user to login
    LoggedOut,
    /// Transient refresh failure; the session is kept for the next attempt
    Failed,
    Busy,
}

/// Things that happen to the session without a caller waiting on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A background check ended the session
    Expired,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub refresh_interval: Duration,
    pub refresh_lead: chrono::Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            refresh_lead: chrono::Duration::seconds(DEFAULT_REFRESH_LEAD_SECS),
        }
    }
}

// ============================================================================
// Internals
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Login,
    Logout,
    Refresh,
}

/// Who asked for a token check. Decides timer handling and whether a
/// forced logout has to be reported as an event.
#[derive(Debug, Clone, Copy)]
enum Origin {
    Caller,
    Background,
    Timer(u64),
}

struct Inner {
    transport: Arc<dyn CredentialTransport>,
    tokens: TokenStore,
    user: UserStore,
    notifier: Arc<dyn NotificationSink>,
    state_file: SessionFile,
    settings: SessionSettings,

    authenticated: AtomicBool,
    in_flight: Mutex<Option<Operation>>,
    op_lock: AsyncMutex<()>,

    timer: Mutex<Option<RefreshTimer>>,
    next_timer_id: AtomicU64,

    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self.timer.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(timer) = slot.take() {
            timer.cancel();
        }
    }
}

/// Holds the operation lock; clears the pending flag when dropped.
struct OperationGuard<'a> {
    inner: &'a Inner,
    _lock: AsyncMutexGuard<'a, ()>,
}

impl<'a> OperationGuard<'a> {
    fn new(inner: &'a Inner, lock: AsyncMutexGuard<'a, ()>) -> Self {
        Self { inner, _lock: lock }
    }

    fn mark_pending(&self, op: Operation) {
        *self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner()) = Some(op);
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        *self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

// ============================================================================
// Session
// ============================================================================

/// The client's authentication session.
/// Clone is cheap and every clone refers to the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

pub struct SessionBuilder {
    transport: Arc<dyn CredentialTransport>,
    tokens: Option<TokenStore>,
    notifier: Option<Arc<dyn NotificationSink>>,
    state_file: Option<SessionFile>,
    settings: SessionSettings,
}

impl SessionBuilder {
    pub fn tokens(mut self, tokens: TokenStore) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn state_file(mut self, state_file: SessionFile) -> Self {
        self.state_file = Some(state_file);
        self
    }

    pub fn settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Session {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        let tokens = self.tokens.unwrap_or_else(TokenStore::in_memory);
        let authenticated = tokens.has_pair();

        Session {
            inner: Arc::new(Inner {
                transport: self.transport,
                tokens,
                user: UserStore::new(),
                notifier: self.notifier.unwrap_or_else(|| Arc::new(LogSink)),
                state_file: self.state_file.unwrap_or_else(SessionFile::ephemeral),
                settings: self.settings,
                authenticated: AtomicBool::new(authenticated),
                in_flight: Mutex::new(None),
                op_lock: AsyncMutex::new(()),
                timer: Mutex::new(None),
                next_timer_id: AtomicU64::new(0),
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
            }),
        }
    }
}

impl Session {
    pub fn builder(transport: Arc<dyn CredentialTransport>) -> SessionBuilder {
        SessionBuilder {
            transport,
            tokens: None,
            notifier: None,
            state_file: None,
            settings: SessionSettings::default(),
        }
    }

    // ===== State =====

    pub fn is_authenticated(&self) -> bool {
        self.inner.authenticated.load(Ordering::SeqCst)
    }

    /// True strictly while a login, logout or refresh call is in flight.
    pub fn is_pending(&self) -> bool {
        self.in_flight().is_some()
    }

    pub fn phase(&self) -> Phase {
        match self.in_flight() {
            Some(Operation::Login) => Phase::LoggingIn,
            Some(Operation::Logout) => Phase::LoggingOut,
            Some(Operation::Refresh) => Phase::Refreshing,
            None if self.is_authenticated() => Phase::LoggedIn,
            None => Phase::LoggedOut,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    /// Both tokens are present and unexpired.
    pub fn has_tokens(&self) -> bool {
        self.inner.tokens.has_pair()
    }

    pub fn user(&self) -> Value {
        self.inner.user.user()
    }

    pub fn has_refresh_timer(&self) -> bool {
        self.timer_slot()
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    /// Receiver for background session events. Can be taken once.
    pub fn take_events(&self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.inner
            .events_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    fn in_flight(&self) -> Option<Operation> {
        *self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn timer_slot(&self) -> std::sync::MutexGuard<'_, Option<RefreshTimer>> {
        self.inner.timer.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ===== Lifecycle =====

    /// Reload persisted state at boot. Must run inside a tokio runtime
    /// since a live session restarts its refresh timer.
    pub fn restore(&self) -> bool {
        let saved = match self.inner.state_file.load() {
            Ok(saved) => saved,
            Err(e) => {
                warn!(error = %e, "Failed to load session state, starting fresh");
                PersistedSession::default()
            }
        };

        let live = self.inner.tokens.has_pair();
        if live && !saved.user.is_null() {
            self.inner.user.set_user(saved.user);
        } else {
            self.inner.user.reset();
        }
        self.inner.authenticated.store(live, Ordering::SeqCst);

        if saved.authenticated != live {
            debug!(saved = saved.authenticated, live, "Persisted session flag was stale");
            self.persist();
        }
        if live {
            self.start_refresh_timer();
        }

        info!(authenticated = live, "Session restored");
        live
    }

    /// Stop background work. The session stays usable.
    pub fn shutdown(&self) {
        if let Some(timer) = self.timer_slot().take() {
            timer.cancel();
        }
        self.persist();
        debug!("Session shut down");
    }

    // ===== Operations =====

    pub async fn login(&self, credentials: &Credentials) -> AuthOutcome {
        let Ok(lock) = self.inner.op_lock.try_lock() else {
            debug!("Login ignored, another auth operation is in flight");
            return AuthOutcome::Busy;
        };
        let guard = OperationGuard::new(&self.inner, lock);
        guard.mark_pending(Operation::Login);

        info!(user = %credentials.username_or_email, "Logging in");
        let reply = match self.inner.transport.login(credentials).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.notify_error(&e);
                return if e.is_auth_rejection() {
                    AuthOutcome::Rejected
                } else {
                    AuthOutcome::Failed
                };
            }
        };

        let pair = reply.data.tokens();
        if !pair.is_complete() {
            warn!("Login response did not include both tokens");
            self.notify(Notification::error("Error", DEFAULT_ERROR_DETAIL));
            return AuthOutcome::Failed;
        }

        self.store_tokens(&pair);
        self.inner.user.set_user(reply.data.user);
        self.inner.authenticated.store(true, Ordering::SeqCst);
        self.persist();
        self.start_refresh_timer();

        info!("Login successful");
        self.notify(Notification::success(
            reply.status.unwrap_or_else(|| "Success".to_string()),
            reply.message.unwrap_or_default(),
        ));
        AuthOutcome::Success
    }

    /// End the session. Local state is cleared whatever the server says.
    pub async fn logout(&self) -> AuthOutcome {
        let lock = self.inner.op_lock.lock().await;
        let guard = OperationGuard::new(&self.inner, lock);
        guard.mark_pending(Operation::Logout);

        let result = match self.inner.tokens.access_token() {
            Some(token) => self.inner.transport.logout(&token).await.map(Some),
            None => {
                debug!("No access token, skipping remote logout");
                Ok(None)
            }
        };

        self.reset_local(Origin::Caller);

        match result {
            Ok(reply) => {
                info!("Logged out");
                let reply = reply.unwrap_or_default();
                self.notify(Notification::success(
                    reply.status.unwrap_or_else(|| "Success".to_string()),
                    reply.message.unwrap_or_else(|| SIGNED_OUT_DETAIL.to_string()),
                ));
                AuthOutcome::Success
            }
            Err(e) => {
                warn!(error = %e, "Remote logout failed, local session cleared anyway");
                self.notify_error(&e);
                AuthOutcome::Failed
            }
        }
    }

    /// Reconcile local tokens with the server.
    ///
    /// Missing tokens end the session without a network call. A live access
    /// token is refreshed once it is inside the refresh lead window. Only an
    /// auth rejection of the refresh forces a logout; transient failures keep
    /// the session for the next attempt.
    pub async fn check_and_refresh_tokens(&self) -> RefreshOutcome {
        self.check(Origin::Caller).await
    }

    /// Run a check without waiting on it. A forced logout is reported
    /// through the event channel.
    pub fn spawn_check(&self) {
        let session = self.clone();
        tokio::spawn(async move {
            session.check(Origin::Background).await;
        });
    }

    /// (Re)start the recurring refresh timer. Any previous timer is
    /// cancelled first, so at most one is ever live.
    pub fn start_refresh_timer(&self) {
        let id = self.inner.next_timer_id.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = Arc::downgrade(&self.inner);

        let mut slot = self.timer_slot();
        if let Some(previous) = slot.take() {
            previous.cancel();
        }

        *slot = Some(RefreshTimer::spawn(
            id,
            self.inner.settings.refresh_interval,
            move || {
                let weak = weak.clone();
                async move {
                    let Some(inner) = weak.upgrade() else {
                        return ControlFlow::Break(());
                    };
                    let session = Session { inner };
                    match session.check(Origin::Timer(id)).await {
                        RefreshOutcome::LoggedOut => ControlFlow::Break(()),
                        _ => ControlFlow::Continue(()),
                    }
                }
            },
        ));
    }

    async fn check(&self, origin: Origin) -> RefreshOutcome {
        let Ok(lock) = self.inner.op_lock.try_lock() else {
            debug!(?origin, "Token check skipped, another auth operation is in flight");
            return RefreshOutcome::Busy;
        };
        let guard = OperationGuard::new(&self.inner, lock);

        let (access, refresh) = self.inner.tokens.get();
        let Some(access) = access else {
            debug!(?origin, "No access token, ending session");
            self.reset_local(origin);
            return self.logged_out(origin);
        };
        if refresh.is_none() {
            debug!(?origin, "No refresh token, ending session");
            self.reset_local(origin);
            return self.logged_out(origin);
        }

        if !self.access_token_expiring() {
            return RefreshOutcome::Valid;
        }

        guard.mark_pending(Operation::Refresh);
        debug!(?origin, "Refreshing access token");
        match self.inner.transport.refresh(&access).await {
            Ok(reply) => {
                let pair = TokenPair::from(reply.data);
                if !pair.is_complete() {
                    warn!("Refresh response did not include both tokens");
                    self.notify(Notification::error("Error", DEFAULT_ERROR_DETAIL));
                    return RefreshOutcome::Failed;
                }
                self.store_tokens(&pair);
                self.inner.authenticated.store(true, Ordering::SeqCst);
                self.persist();
                // A tick must not cancel the timer it is running on
                if !matches!(origin, Origin::Timer(_)) {
                    self.start_refresh_timer();
                }
                info!(?origin, "Access token refreshed");
                RefreshOutcome::Refreshed
            }
            Err(e) if e.is_auth_rejection() => {
                warn!(error = %e, "Refresh rejected, ending session");
                self.notify_error(&e);
                self.reset_local(origin);
                self.logged_out(origin)
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed, will retry");
                self.notify_error(&e);
                RefreshOutcome::Failed
            }
        }
    }

    // ===== Helpers =====

    fn access_token_expiring(&self) -> bool {
        match self.inner.tokens.access_expires_at() {
            Some(expires_at) => expires_at - Utc::now() <= self.inner.settings.refresh_lead,
            None => true,
        }
    }

    fn store_tokens(&self, pair: &TokenPair) {
        if let Err(e) = self.inner.tokens.set(pair) {
            warn!(error = %e, "Failed to persist tokens");
        }
    }

    fn reset_local(&self, origin: Origin) {
        if let Err(e) = self.inner.tokens.clear() {
            warn!(error = %e, "Failed to clear stored tokens");
        }
        self.inner.user.reset();
        self.inner.authenticated.store(false, Ordering::SeqCst);
        self.persist();

        let mut slot = self.timer_slot();
        match origin {
            // Running on that timer: let the tick finish and end the task itself
            Origin::Timer(id) => {
                if slot.as_ref().map(RefreshTimer::id) == Some(id) {
                    slot.take();
                }
            }
            Origin::Caller | Origin::Background => {
                if let Some(timer) = slot.take() {
                    timer.cancel();
                }
            }
        }
    }

    fn logged_out(&self, origin: Origin) -> RefreshOutcome {
        if !matches!(origin, Origin::Caller) {
            if let Err(e) = self.inner.events_tx.try_send(SessionEvent::Expired) {
                debug!(error = %e, "Session event not delivered");
            }
        }
        RefreshOutcome::LoggedOut
    }

    fn persist(&self) {
        let state = PersistedSession {
            authenticated: self.is_authenticated(),
            user: self.inner.user.user(),
        };
        if let Err(e) = self.inner.state_file.save(&state) {
            warn!(error = %e, "Failed to save session state");
        }
    }

    fn notify(&self, notification: Notification) {
        self.inner.notifier.notify(notification);
    }

    fn notify_error(&self, e: &ApiError) {
        self.notify(Notification::error(
            e.summary().unwrap_or_else(|| "Error".to_string()),
            e.server_message().unwrap_or(DEFAULT_ERROR_DETAIL),
        ));
    }
}

// ============================================================================
// Tests
// ============================================================================
