use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use super::catalog::{normalize_path, MatchMode};
use super::evaluator::{satisfies, DenyReason, PolicyEvaluator, RouteAccess};
use super::permission::{parse_permissions, GrantedPermissions};
use crate::session::{SessionState, SessionStore};

pub const DEFAULT_LOGIN_PATH: &str = "/admin/login";
pub const DEFAULT_DENIED_PATH: &str = "/access-denied";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RedirectReason {
    /// No one is logged in.
    Unauthenticated,
    /// Logged in, but the grants do not open this route.
    Forbidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// The session is still hydrating; render nothing yet.
    Pending,
    Redirect { location: String, reason: RedirectReason },
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

/// Gates protected screens and API calls on the current session.
#[derive(Clone)]
pub struct RouteGuard {
    evaluator: Arc<dyn PolicyEvaluator>,
    bypass: Vec<String>,
    login_path: String,
    denied_path: String,
}

impl RouteGuard {
    pub fn new(evaluator: Arc<dyn PolicyEvaluator>) -> Self {
        Self {
            evaluator,
            bypass: vec![DEFAULT_LOGIN_PATH.to_string(), DEFAULT_DENIED_PATH.to_string()],
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            denied_path: DEFAULT_DENIED_PATH.to_string(),
        }
    }

    pub fn with_bypass(mut self, path: &str) -> Self {
        self.bypass.push(normalize_path(path));
        self
    }

    pub fn with_login_path(mut self, path: &str) -> Self {
        self.login_path = normalize_path(path);
        self
    }

    pub fn with_denied_path(mut self, path: &str) -> Self {
        self.denied_path = normalize_path(path);
        self
    }

    pub fn evaluator(&self) -> &dyn PolicyEvaluator {
        self.evaluator.as_ref()
    }

    pub fn is_bypassed(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.bypass.iter().any(|candidate| *candidate == path)
    }

    /// Decide synchronously on a known session state.
    pub fn check(&self, state: &SessionState, path: &str) -> GuardDecision {
        if self.is_bypassed(path) {
            return GuardDecision::Allow;
        }

        if state.is_hydrating() {
            return GuardDecision::Pending;
        }

        let access = self.evaluator.evaluate_route(state.granted(), path);
        if access.is_allowed() {
            return GuardDecision::Allow;
        }

        if !state.is_authenticated() {
            tracing::debug!(path = %path, "anonymous session redirected to login");
            return GuardDecision::Redirect {
                location: format!("{}?next={}", self.login_path, normalize_path(path)),
                reason: RedirectReason::Unauthenticated,
            };
        }

        tracing::warn!(
            path = %path,
            user_id = %state.user_id().unwrap_or_default(),
            access = ?access,
            "route denied"
        );
        GuardDecision::Redirect {
            location: self.denied_path.clone(),
            reason: RedirectReason::Forbidden,
        }
    }

    /// Wait until the session is hydrated, then decide.
    ///
    /// Re-entrant; each call reads the latest session state.
    pub async fn resolve(&self, session: &SessionStore, path: &str) -> GuardDecision {
        if self.is_bypassed(path) {
            return GuardDecision::Allow;
        }

        let mut rx = session.subscribe();
        let state = match rx.wait_for(|state| !state.is_hydrating()).await {
            Ok(state) => state.clone(),
            Err(_) => return GuardDecision::Pending,
        };

        self.check(&state, path)
    }

    pub fn evaluate(&self, state: &SessionState, path: &str) -> RouteAccess {
        self.evaluator.evaluate_route(state.granted(), path)
    }
}

/// Action-level check used inside handlers and UI conditionals.
pub fn require_permission(
    granted: Option<&GrantedPermissions>,
    required: &[&str],
    mode: MatchMode,
) -> Result<(), DenyReason> {
    if granted.is_none() {
        return Err(DenyReason::SessionUnavailable);
    }

    let parsed = parse_permissions(required);
    // A malformed requirement can never be granted.
    let complete = parsed.len() == required.len();
    let ok = match mode {
        MatchMode::All => complete && satisfies(granted, &parsed, mode),
        MatchMode::Any if parsed.is_empty() && !required.is_empty() => false,
        MatchMode::Any => satisfies(granted, &parsed, mode),
    };

    if ok {
        Ok(())
    } else {
        Err(DenyReason::MissingPermissions {
            required: required.iter().map(|p| p.to_lowercase()).collect(),
            mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::permissions::*;
    use crate::authz::{DefaultPolicyEvaluator, RouteCatalog};
    use crate::session::{MemoryStorage, SessionInfo, SessionStore};

    fn guard() -> RouteGuard {
        let catalog = Arc::new(RouteCatalog::admin_pages().unwrap());
        RouteGuard::new(Arc::new(DefaultPolicyEvaluator::new(catalog)))
    }

    fn authenticated(tokens: &[&str]) -> SessionState {
        SessionState::Authenticated(Arc::new(SessionInfo {
            user_id: "7".to_string(),
            name: "Front Desk".to_string(),
            role: "staff".to_string(),
            access_token: "token".to_string(),
            refresh_token: None,
            permissions: parse_permissions(tokens).into_iter().collect(),
        }))
    }

    #[test]
    fn test_login_page_is_always_allowed() {
        let guard = guard();
        assert_eq!(guard.check(&SessionState::Hydrating, "/admin/login"), GuardDecision::Allow);
        assert_eq!(guard.check(&SessionState::Anonymous, "/admin/login/"), GuardDecision::Allow);
    }

    #[test]
    fn test_hydrating_session_blocks_rendering() {
        let guard = guard();
        assert_eq!(guard.check(&SessionState::Hydrating, "/admin/bookings"), GuardDecision::Pending);
        assert_eq!(guard.check(&SessionState::Hydrating, "/"), GuardDecision::Pending);
    }

    #[test]
    fn test_anonymous_admin_access_redirects_to_login() {
        let guard = guard();
        assert_eq!(
            guard.check(&SessionState::Anonymous, "/admin/dashboard"),
            GuardDecision::Redirect {
                location: "/admin/login?next=/admin/dashboard".to_string(),
                reason: RedirectReason::Unauthenticated,
            }
        );
        assert_eq!(guard.check(&SessionState::Anonymous, "/"), GuardDecision::Allow);
    }

    #[test]
    fn test_missing_permission_redirects_to_access_denied() {
        let guard = guard();
        let state = authenticated(&[BOOKING_VIEW]);

        assert_eq!(guard.check(&state, "/admin/bookings"), GuardDecision::Allow);
        assert_eq!(
            guard.check(&state, "/admin/users"),
            GuardDecision::Redirect {
                location: DEFAULT_DENIED_PATH.to_string(),
                reason: RedirectReason::Forbidden,
            }
        );
    }

    #[test]
    fn test_require_permission_modes() {
        let granted: GrantedPermissions = parse_permissions([BLOG_VIEW, BLOG_EDIT]).into_iter().collect();

        assert!(require_permission(Some(&granted), &[BLOG_VIEW, BLOG_EDIT], MatchMode::All).is_ok());
        assert!(require_permission(Some(&granted), &[BLOG_VIEW, BLOG_PUBLISH], MatchMode::All).is_err());
        assert!(require_permission(Some(&granted), &[BLOG_PUBLISH, BLOG_EDIT], MatchMode::Any).is_ok());
        assert!(require_permission(Some(&granted), &["not valid"], MatchMode::Any).is_err());
        assert!(require_permission(Some(&granted), &[], MatchMode::Any).is_ok());
        assert_eq!(
            require_permission(None, &[], MatchMode::All),
            Err(DenyReason::SessionUnavailable)
        );
    }

    #[tokio::test]
    async fn test_resolve_waits_for_hydration() {
        let storage = Arc::new(MemoryStorage::with_entries([
            ("accessToken", "token"),
            ("userId", "7"),
            ("permissions", "booking:view"),
        ]));
        let session = Arc::new(SessionStore::new(storage));
        let guard = guard();

        assert_eq!(guard.check(&session.snapshot(), "/admin/bookings"), GuardDecision::Pending);

        let waiting = {
            let session = Arc::clone(&session);
            let guard = guard.clone();
            tokio::spawn(async move { guard.resolve(&session, "/admin/bookings").await })
        };

        session.hydrate().await.unwrap();
        assert_eq!(waiting.await.unwrap(), GuardDecision::Allow);
    }
}
