//! Current location, guarded navigation and history.

use thiserror::Error;
use tracing::{debug, info};

use super::breadcrumbs::{Breadcrumb, RouteRegistry};
use super::guard::{GuardDecision, RouteGuard};
use crate::auth::Session;

// ===== Constants =====

/// Redirect hops followed before navigation gives up.
pub const MAX_REDIRECTS: usize = 5;

/// Committed paths kept in history.
pub const MAX_HISTORY: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Too many redirects navigating to {target} (last: {last})")]
    RedirectLoop { target: String, last: String },
}

/// Canonical form of a navigation target: one leading `/`, no trailing `/`,
/// no empty segments, query string and fragment dropped.
pub fn normalize_path(target: &str) -> String {
    let end = target.find(|c: char| c == '?' || c == '#').unwrap_or(target.len());
    let segments: Vec<&str> = target[..end].split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

pub struct Router {
    guard: RouteGuard,
    routes: RouteRegistry,
    current: Option<String>,
    history: Vec<String>,
}

impl Router {
    pub fn new(guard: RouteGuard, routes: RouteRegistry) -> Self {
        Self {
            guard,
            routes,
            current: None,
            history: Vec::new(),
        }
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    pub fn routes(&self) -> &RouteRegistry {
        &self.routes
    }

    /// The committed path, if any navigation has succeeded yet.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Committed paths, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Navigate to `target`, following guard redirects.
    ///
    /// Returns the path actually committed. Every hop is re-evaluated, so a
    /// redirect target is itself subject to the guard.
    pub async fn navigate(
        &mut self,
        target: &str,
        session: &Session,
    ) -> Result<String, NavigationError> {
        let requested = normalize_path(target);
        let mut path = requested.clone();

        for _ in 0..=MAX_REDIRECTS {
            match self.guard.evaluate(&path, session).await {
                GuardDecision::Allow => {
                    self.commit(path.clone());
                    return Ok(path);
                }
                GuardDecision::Redirect(next) => {
                    debug!(from = %path, to = %next, "Redirect");
                    path = normalize_path(&next);
                }
            }
        }

        Err(NavigationError::RedirectLoop {
            target: requested,
            last: path,
        })
    }

    /// Breadcrumb trail for the committed path.
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.current
            .as_deref()
            .map(|path| self.routes.breadcrumbs(path))
            .unwrap_or_default()
    }

    fn commit(&mut self, path: String) {
        if self.current.as_deref() == Some(path.as_str()) {
            return;
        }
        info!(path = %path, "Navigated");
        self.history.push(path.clone());
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
        self.current = Some(path);
    }
}
