//! Navigation guard enforcing which areas need a session.

use tracing::debug;

use crate::auth::Session;

pub const DEFAULT_AUTH_AREA: &str = "/auth";
pub const DEFAULT_PROTECTED_AREA: &str = "/dashboard";
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
pub const DEFAULT_HOME_PATH: &str = "/dashboard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    /// Pages for signed-out users (login, password reset)
    pub auth_area: String,
    /// Pages requiring a session
    pub protected_area: String,
    pub login_path: String,
    pub home_path: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            auth_area: DEFAULT_AUTH_AREA.to_string(),
            protected_area: DEFAULT_PROTECTED_AREA.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            home_path: DEFAULT_HOME_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

/// Whether the guard waits for the token check before deciding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    #[default]
    Awaited,
    /// Fire and forget; the decision uses the tokens as they are now
    Detached,
}

#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    config: GuardConfig,
    refresh_mode: RefreshMode,
}

impl RouteGuard {
    pub fn new(config: GuardConfig, refresh_mode: RefreshMode) -> Self {
        Self {
            config,
            refresh_mode,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Decide whether navigation to `target` may proceed.
    ///
    /// With credentials present the session is reconciled first, so a token
    /// the server no longer honours sends the user to login right away.
    pub async fn evaluate(&self, target: &str, session: &Session) -> GuardDecision {
        if session.has_tokens() {
            match self.refresh_mode {
                RefreshMode::Awaited => {
                    let outcome = session.check_and_refresh_tokens().await;
                    debug!(?outcome, target, "Token check before navigation");
                }
                RefreshMode::Detached => session.spawn_check(),
            }
        }

        let decision = self.decide(target, session.has_tokens());
        debug!(target, ?decision, "Route guard");
        decision
    }

    /// The routing rules on their own. First match wins.
    pub fn decide(&self, target: &str, has_tokens: bool) -> GuardDecision {
        let config = &self.config;

        if has_tokens && in_area(target, &config.auth_area) {
            return GuardDecision::Redirect(config.home_path.clone());
        }

        if !has_tokens && in_area(target, &config.protected_area) {
            return GuardDecision::Redirect(config.login_path.clone());
        }

        if target == "/" {
            let to = if has_tokens {
                &config.home_path
            } else {
                &config.login_path
            };
            return GuardDecision::Redirect(to.clone());
        }

        GuardDecision::Allow
    }
}

/// `path` is `area` itself or lies below it, by whole segments.
pub fn in_area(path: &str, area: &str) -> bool {
    let area = area.trim_end_matches('/');
    match path.strip_prefix(area) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::api::AuthClient;
    use crate::auth::TokenPair;

    fn guard() -> RouteGuard {
        RouteGuard::default()
    }

    fn redirect(path: &str) -> GuardDecision {
        GuardDecision::Redirect(path.to_string())
    }

    #[test]
    fn test_in_area_matches_whole_segments() {
        assert!(in_area("/dashboard", "/dashboard"));
        assert!(in_area("/dashboard/users", "/dashboard"));
        assert!(in_area("/dashboard/users", "/dashboard/"));
        assert!(!in_area("/dashboards", "/dashboard"));
        assert!(!in_area("/auth-help", "/auth"));
        assert!(!in_area("/", "/dashboard"));
    }

    #[test]
    fn test_protected_path_without_tokens() {
        assert_eq!(guard().decide("/dashboard/users", false), redirect("/auth/login"));
        assert_eq!(guard().decide("/dashboard", false), redirect("/auth/login"));
    }

    #[test]
    fn test_auth_path_with_tokens() {
        assert_eq!(guard().decide("/auth/login", true), redirect("/dashboard"));
        assert_eq!(guard().decide("/auth/forgot-password", true), redirect("/dashboard"));
    }

    #[test]
    fn test_root_path() {
        assert_eq!(guard().decide("/", true), redirect("/dashboard"));
        assert_eq!(guard().decide("/", false), redirect("/auth/login"));
    }

    #[test]
    fn test_everything_else_allowed() {
        assert_eq!(guard().decide("/dashboard/users", true), GuardDecision::Allow);
        assert_eq!(guard().decide("/auth/login", false), GuardDecision::Allow);
        assert_eq!(guard().decide("/about", false), GuardDecision::Allow);
        assert_eq!(guard().decide("/about", true), GuardDecision::Allow);
    }

    #[test]
    fn test_redirect_targets_are_stable() {
        let g = guard();
        for has_tokens in [true, false] {
            for target in ["/", "/dashboard/users", "/auth/login", "/about"] {
                if let GuardDecision::Redirect(next) = g.decide(target, has_tokens) {
                    assert_eq!(g.decide(&next, has_tokens), GuardDecision::Allow, "{} -> {}", target, next);
                }
            }
        }
    }

    fn offline_session() -> Session {
        // Nothing listens here; no test below expects a network call
        let client = AuthClient::new("http://127.0.0.1:9", "key").expect("client builds");
        Session::builder(Arc::new(client)).build()
    }

    #[tokio::test]
    async fn test_evaluate_without_tokens() {
        let session = offline_session();
        let decision = guard().evaluate("/dashboard/users", &session).await;
        assert_eq!(decision, redirect("/auth/login"));
    }

    #[tokio::test]
    async fn test_evaluate_with_tokens_is_idempotent() {
        let session = offline_session();
        session.tokens().set(&TokenPair::new("A1", "R1")).expect("seed");

        let g = guard();
        assert_eq!(g.evaluate("/auth/login", &session).await, redirect("/dashboard"));
        assert_eq!(g.evaluate("/auth/login", &session).await, redirect("/dashboard"));
        assert_eq!(g.evaluate("/dashboard", &session).await, GuardDecision::Allow);
        assert_eq!(g.evaluate("/dashboard", &session).await, GuardDecision::Allow);
    }

    #[tokio::test]
    async fn test_detached_check_reports_rejected_refresh() {
        use std::time::Duration;

        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        use crate::auth::{SessionEvent, SessionSettings};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh-token"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"message": "Refresh token expired"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri(), "key").expect("client builds");
        // Lead longer than the access max-age: every check refreshes
        let session = Session::builder(Arc::new(client))
            .settings(SessionSettings {
                refresh_lead: chrono::Duration::hours(2),
                ..SessionSettings::default()
            })
            .build();
        let mut events = session.take_events().expect("events");
        session.tokens().set(&TokenPair::new("A1", "R1")).expect("seed");

        let g = RouteGuard::new(GuardConfig::default(), RefreshMode::Detached);
        // Decided from the tokens as they were, without waiting on the check
        assert_eq!(g.evaluate("/dashboard", &session).await, GuardDecision::Allow);

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("check finishes");
        assert_eq!(event, Some(SessionEvent::Expired));
        assert!(!session.has_tokens());
        assert_eq!(g.evaluate("/dashboard", &session).await, redirect("/auth/login"));
    }
}
