//! Application state for the console client.
//!
//! `App` ties the session to the router: it turns session outcomes into
//! navigations and picks up sessions that ended in the background.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::Credentials;
use crate::auth::{AuthOutcome, Session, SessionEvent};
use crate::config::Config;
use crate::nav::{console_routes, NavigationError, RefreshMode, RouteGuard, Router};
use crate::notify::NotificationSink;

pub struct App {
    session: Session,
    router: Router,
    events: Option<mpsc::Receiver<SessionEvent>>,
}

impl App {
    pub fn new(session: Session, router: Router) -> Self {
        let events = session.take_events();
        Self {
            session,
            router,
            events,
        }
    }

    /// Wire up everything the console needs from `config`.
    pub fn from_config(
        config: &Config,
        state_dir: &Path,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let client = config.build_client()?;
        let session = Session::builder(Arc::new(client))
            .tokens(config.build_token_store(state_dir))
            .state_file(config.session_file(state_dir))
            .settings(config.session_settings())
            .notifier(notifier)
            .build();
        let router = Router::new(
            RouteGuard::new(Default::default(), RefreshMode::Awaited),
            console_routes(),
        );
        Ok(Self::new(session, router))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn current_path(&self) -> Option<&str> {
        self.router.current()
    }

    /// Restore the saved session, reconcile it once and land on `path`
    /// (or wherever the guard sends us instead).
    pub async fn boot(&mut self, path: &str) -> Result<String, NavigationError> {
        let restored = self.session.restore();
        if restored {
            let outcome = self.session.check_and_refresh_tokens().await;
            debug!(?outcome, "Boot token check");
        }
        let landed = self.router.navigate(path, &self.session).await?;
        info!(path = %landed, authenticated = self.session.is_authenticated(), "Booted");
        Ok(landed)
    }

    pub async fn navigate(&mut self, path: &str) -> Result<String, NavigationError> {
        self.router.navigate(path, &self.session).await
    }

    /// Log in and, on success, go to the dashboard home.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<AuthOutcome, NavigationError> {
        let outcome = self.session.login(credentials).await;
        if outcome == AuthOutcome::Success {
            let home = self.router.guard().config().home_path.clone();
            self.router.navigate(&home, &self.session).await?;
        }
        Ok(outcome)
    }

    /// Log out and go to the login page, whether or not the server agreed.
    pub async fn logout(&mut self) -> Result<AuthOutcome, NavigationError> {
        let outcome = self.session.logout().await;
        let login = self.router.guard().config().login_path.clone();
        self.router.navigate(&login, &self.session).await?;
        Ok(outcome)
    }

    /// Handle events from background session work. Returns true when the
    /// session had ended and the user was sent to the login page.
    pub async fn check_background_tasks(&mut self) -> Result<bool, NavigationError> {
        // Collect first to release the borrow on the receiver
        let events: Vec<SessionEvent> = match self.events.as_mut() {
            Some(rx) => {
                let mut events = Vec::new();
                while let Ok(event) = rx.try_recv() {
                    events.push(event);
                }
                events
            }
            None => Vec::new(),
        };

        if !events.contains(&SessionEvent::Expired) {
            return Ok(false);
        }

        info!("Session expired in the background");
        let login = self.router.guard().config().login_path.clone();
        self.router.navigate(&login, &self.session).await?;
        Ok(true)
    }

    pub fn shutdown(&self) {
        self.session.shutdown();
    }
}
