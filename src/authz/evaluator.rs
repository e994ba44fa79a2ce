use std::sync::Arc;

use serde::Serialize;

use super::catalog::{MatchMode, RouteCatalog};
use super::permission::{GrantedPermissions, Permission};

/// Policy evaluator trait for pluggable authorization logic
///
/// `granted` is `None` while the session is not hydrated; every predicate
/// answers `false` in that state, including vacuous checks.
pub trait PolicyEvaluator: Send + Sync {
    /// Every permission in `required` is granted. An empty list is satisfied.
    fn has_all(&self, granted: Option<&GrantedPermissions>, required: &[Permission]) -> bool;

    /// At least one permission in `required` is granted. An empty list is satisfied.
    fn has_any(&self, granted: Option<&GrantedPermissions>, required: &[Permission]) -> bool;

    /// Explain whether `path` may be opened with the given grants.
    fn evaluate_route(&self, granted: Option<&GrantedPermissions>, path: &str) -> RouteAccess;

    fn can_access_route(&self, granted: Option<&GrantedPermissions>, path: &str) -> bool {
        self.evaluate_route(granted, path).is_allowed()
    }
}

/// Why a route was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenyReason {
    /// The session has not been hydrated yet.
    SessionUnavailable,
    /// A rule matched but the grants do not satisfy it.
    MissingPermissions { required: Vec<String>, mode: MatchMode },
    /// No rule governs this path and it lies under the protected prefix.
    Ungoverned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteAccess {
    /// Outside the protected prefix with no rule.
    Public,
    /// A rule matched and was satisfied.
    Allowed { rule: String },
    Denied { reason: DenyReason },
}

impl RouteAccess {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RouteAccess::Public | RouteAccess::Allowed { .. })
    }
}

/// Default evaluator over a route catalog
///
/// Evaluation order for routes:
/// 1. session not hydrated -> deny
/// 2. rule found -> apply its ALL/ANY mode
/// 3. no rule under the protected prefix -> deny
/// 4. no rule elsewhere -> allow
#[derive(Debug, Clone)]
pub struct DefaultPolicyEvaluator {
    catalog: Arc<RouteCatalog>,
}

impl DefaultPolicyEvaluator {
    pub fn new(catalog: Arc<RouteCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &RouteCatalog {
        &self.catalog
    }
}

/// Shared ALL/ANY check used by the evaluator and `require_permission`.
pub(crate) fn satisfies(granted: Option<&GrantedPermissions>, required: &[Permission], mode: MatchMode) -> bool {
    let Some(granted) = granted else {
        return false;
    };

    if required.is_empty() {
        return true;
    }

    match mode {
        MatchMode::All => required.iter().all(|p| granted.contains(p)),
        MatchMode::Any => required.iter().any(|p| granted.contains(p)),
    }
}

impl PolicyEvaluator for DefaultPolicyEvaluator {
    fn has_all(&self, granted: Option<&GrantedPermissions>, required: &[Permission]) -> bool {
        satisfies(granted, required, MatchMode::All)
    }

    fn has_any(&self, granted: Option<&GrantedPermissions>, required: &[Permission]) -> bool {
        satisfies(granted, required, MatchMode::Any)
    }

    fn evaluate_route(&self, granted: Option<&GrantedPermissions>, path: &str) -> RouteAccess {
        // 1. Nothing is decided before the session is readable
        if granted.is_none() {
            tracing::debug!(path = %path, "session unavailable, denying route");
            return RouteAccess::Denied {
                reason: DenyReason::SessionUnavailable,
            };
        }

        // 2. Governed route
        if let Some(rule) = self.catalog.resolve_rule(path) {
            let route = rule.matcher.describe().to_string();
            if satisfies(granted, &rule.permissions, rule.mode) {
                tracing::debug!(path = %path, rule = %route, "route allowed by rule");
                return RouteAccess::Allowed { rule: route };
            }

            tracing::debug!(path = %path, rule = %route, mode = ?rule.mode, "missing permissions for route");
            return RouteAccess::Denied {
                reason: DenyReason::MissingPermissions {
                    required: rule.permissions.iter().map(|p| p.to_string()).collect(),
                    mode: rule.mode,
                },
            };
        }

        // 3. Ungoverned protected route fails closed
        if self.catalog.is_protected(path) {
            tracing::debug!(
                path = %path,
                prefix = %self.catalog.protected_prefix(),
                "no rule for protected route"
            );
            return RouteAccess::Denied {
                reason: DenyReason::Ungoverned,
            };
        }

        // 4. Public page
        RouteAccess::Public
    }
}
