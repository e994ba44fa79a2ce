use std::collections::HashMap;

use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use super::permission::{Permission, PermissionError};
use super::permissions::*;

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("invalid route pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("route `{route}` lists an invalid permission: {source}")]
    Permission {
        route: String,
        #[source]
        source: PermissionError,
    },
    #[error("route `{0}` is declared twice")]
    Duplicate(String),
}

/// The closed permission vocabulary with a short description of each token.
pub const KNOWN_PERMISSIONS: &[(&str, &str)] = &[
    (ADMIN_USER, "Full access to user profiles"),
    (ADMIN_USER_VIEW, "View user profiles"),
    (ADMIN_USER_CREATE, "Create user profiles"),
    (ADMIN_USER_UPDATE, "Update user profiles"),
    (ADMIN_USER_DELETE, "Delete user profiles"),
    (ADMIN_USER_ASSIGN_PERMISSIONS, "Assign permissions to users"),
    (ADMIN_USER_ASSIGN_ROLE, "Assign roles to users"),
    (ADMIN_SETTINGS_MANAGE, "Manage system settings"),
    (ADMIN_CONTENT_MANAGE, "Manage site content pages"),
    (ADMIN_REPORTS_VIEW, "View reports and analytics"),
    (ADMIN_REPORTS_EXPORT, "Export reports"),
    (ADMIN_DASHBOARD_VIEW, "View the admin dashboard"),
    (ADMIN_ROLE_VIEW, "View group roles"),
    (ADMIN_ROLE_CREATE, "Create group roles"),
    (ADMIN_ROLE_UPDATE, "Update group roles"),
    (ADMIN_ROLE_DELETE, "Deactivate group roles"),
    (ADMIN_OFFER_VIEW, "View offers"),
    (ADMIN_OFFER_CREATE, "Create offers"),
    (ADMIN_OFFER_UPDATE, "Update offers"),
    (ADMIN_OFFER_DELETE, "Delete offers"),
    (ADMIN_EXPENSE_VIEW, "View expenses"),
    (ADMIN_EXPENSE_CREATE, "Create expenses"),
    (ADMIN_EXPENSE_UPDATE, "Update expenses"),
    (ADMIN_EXPENSE_DELETE, "Delete expenses"),
    (PROPERTY_VIEW, "View properties"),
    (PROPERTY_CREATE, "Create properties"),
    (PROPERTY_UPDATE, "Update properties"),
    (PROPERTY_DELETE, "Delete properties"),
    (PROPERTY_AMENITY_VIEW, "View property amenities"),
    (PROPERTY_AMENITY_CREATE, "Create property amenities"),
    (PROPERTY_AMENITY_UPDATE, "Update property amenities"),
    (PROPERTY_AMENITY_DELETE, "Delete property amenities"),
    (PROPERTY_RULE_VIEW, "View property rules"),
    (PROPERTY_RULE_CREATE, "Create property rules"),
    (PROPERTY_RULE_UPDATE, "Update property rules"),
    (PROPERTY_RULE_DELETE, "Delete property rules"),
    (PROPERTY_DOCUMENTATION_VIEW, "View property documentation"),
    (PROPERTY_DOCUMENTATION_CREATE, "Create property documentation"),
    (PROPERTY_DOCUMENTATION_UPDATE, "Update property documentation"),
    (PROPERTY_DOCUMENTATION_DELETE, "Delete property documentation"),
    (PROPERTY_ROOM_VIEW, "View rooms"),
    (PROPERTY_ROOM_CREATE, "Create rooms"),
    (PROPERTY_ROOM_UPDATE, "Update rooms"),
    (PROPERTY_ROOM_DELETE, "Delete rooms"),
    (BOOKING_VIEW, "View bookings and visits"),
    (BOOKING_CREATE, "Create bookings"),
    (BOOKING_UPDATE, "Update bookings"),
    (BOOKING_DELETE, "Delete bookings"),
    (REVIEW_VIEW, "View reviews"),
    (REVIEW_CREATE, "Create reviews"),
    (REVIEW_UPDATE, "Update reviews"),
    (REVIEW_DELETE, "Delete reviews"),
    (REPLY_VIEW, "View review replies"),
    (REPLY_CREATE, "Create review replies"),
    (REPLY_UPDATE, "Update review replies"),
    (REPLY_DELETE, "Delete review replies"),
    (BLOG_VIEW, "View blog posts"),
    (BLOG_CREATE, "Create blog posts"),
    (BLOG_EDIT, "Edit blog posts"),
    (BLOG_DELETE, "Delete blog posts"),
    (BLOG_PUBLISH, "Publish blog posts"),
];

pub fn is_known(token: &str) -> bool {
    match Permission::parse(token) {
        Ok(permission) => KNOWN_PERMISSIONS
            .iter()
            .any(|(name, _)| *name == permission.as_str()),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Any one of the listed permissions grants access.
    #[default]
    Any,
    /// Every listed permission is required.
    All,
}

#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    regex: Regex,
    static_segments: usize,
    is_template: bool,
}

impl RoutePattern {
    /// Build from a route template where `:name` segments match one path segment.
    pub fn template(template: &str) -> Result<Self, CatalogError> {
        let template = normalize_path(template);
        let mut expr = String::from("^");
        let mut static_segments = 0;

        for segment in template.split('/').filter(|s| !s.is_empty()) {
            expr.push('/');
            if segment.starts_with(':') {
                expr.push_str("[^/]+");
            } else {
                expr.push_str(&regex::escape(segment));
                static_segments += 1;
            }
        }
        if expr == "^" {
            expr.push('/');
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|source| CatalogError::Pattern {
            pattern: template.clone(),
            source,
        })?;

        Ok(Self {
            source: template,
            regex,
            static_segments,
            is_template: true,
        })
    }

    /// Build from a raw regex. Anchors are added when missing so the whole path must match.
    pub fn regex(pattern: &str) -> Result<Self, CatalogError> {
        let mut expr = pattern.to_string();
        if !expr.starts_with('^') {
            expr.insert(0, '^');
        }
        if !expr.ends_with('$') {
            expr.push('$');
        }

        let regex = Regex::new(&expr).map_err(|source| CatalogError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let body = expr.trim_start_matches('^').trim_end_matches('$');
        let static_segments = body
            .split('/')
            .filter(|s| !s.is_empty())
            .filter(|s| !s.chars().any(|c| ".*+?()[]{}|\\^$".contains(c)))
            .count();

        Ok(Self {
            source: expr,
            regex,
            static_segments,
            is_template: false,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone)]
pub enum RouteMatcher {
    Literal(String),
    Pattern(RoutePattern),
}

impl RouteMatcher {
    pub fn describe(&self) -> &str {
        match self {
            RouteMatcher::Literal(path) => path,
            RouteMatcher::Pattern(pattern) => pattern.source(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            RouteMatcher::Literal(_) => "literal",
            RouteMatcher::Pattern(p) if p.is_template => "template",
            RouteMatcher::Pattern(_) => "regex",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    pub matcher: RouteMatcher,
    pub permissions: Vec<Permission>,
    pub mode: MatchMode,
}

impl RouteRule {
    pub fn view(&self) -> RouteRuleView {
        RouteRuleView {
            route: self.matcher.describe().to_string(),
            kind: self.matcher.kind().to_string(),
            permissions: self.permissions.iter().map(|p| p.to_string()).collect(),
            mode: self.mode,
        }
    }
}

/// Serializable form of a rule for the catalog endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteRuleView {
    #[schema(example = "/admin/bookings")]
    pub route: String,
    #[schema(example = "literal")]
    pub kind: String,
    pub permissions: Vec<String>,
    pub mode: MatchMode,
}

/// Ordered route permission table for one protected area.
#[derive(Debug, Clone)]
pub struct RouteCatalog {
    protected_prefix: String,
    literals: HashMap<String, usize>,
    rules: Vec<RouteRule>,
}

impl RouteCatalog {
    pub fn builder(protected_prefix: &str) -> RouteCatalogBuilder {
        RouteCatalogBuilder {
            protected_prefix: normalize_path(protected_prefix),
            entries: Vec::new(),
        }
    }

    pub fn protected_prefix(&self) -> &str {
        &self.protected_prefix
    }

    /// Whether `path` lies inside the protected area, on a segment boundary.
    pub fn is_protected(&self, path: &str) -> bool {
        let path = normalize_path(path);
        if self.protected_prefix == "/" {
            return true;
        }
        path == self.protected_prefix
            || path
                .strip_prefix(self.protected_prefix.as_str())
                .map(|rest| rest.starts_with('/'))
                .unwrap_or(false)
    }

    /// Exact literal first, then patterns most-specific-first.
    pub fn resolve_rule(&self, path: &str) -> Option<&RouteRule> {
        let path = normalize_path(path);
        if let Some(&index) = self.literals.get(&path) {
            return self.rules.get(index);
        }

        self.rules.iter().find(|rule| match &rule.matcher {
            RouteMatcher::Literal(_) => false,
            RouteMatcher::Pattern(pattern) => pattern.is_match(&path),
        })
    }

    pub fn resolve_rules_for_path(&self, path: &str) -> Option<&[Permission]> {
        self.resolve_rule(path).map(|rule| rule.permissions.as_slice())
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Admin screens of the back office.
    pub fn admin_pages() -> Result<Self, CatalogError> {
        use MatchMode::*;

        RouteCatalog::builder("/admin")
            .literal("/admin/dashboard", &[ADMIN_DASHBOARD_VIEW, PROPERTY_VIEW], Any)
            .literal("/admin/properties", &[PROPERTY_VIEW], Any)
            .literal("/admin/properties/create", &[PROPERTY_CREATE], Any)
            .literal("/admin/properties/new", &[PROPERTY_CREATE], Any)
            .regex(r"^/admin/properties/\d+/edit$", &[PROPERTY_UPDATE], Any)
            .regex(r"^/admin/properties/\d+$", &[PROPERTY_VIEW], Any)
            .literal("/admin/bookings", &[BOOKING_VIEW], Any)
            .literal("/admin/visits", &[BOOKING_VIEW], Any)
            .literal("/admin/expenses", &[ADMIN_EXPENSE_VIEW], Any)
            .literal("/admin/users", &[ADMIN_USER_VIEW, ADMIN_USER_ASSIGN_PERMISSIONS], Any)
            .literal("/admin/userroles", &[ADMIN_USER_ASSIGN_PERMISSIONS], Any)
            .literal("/admin/offers", &[ADMIN_OFFER_VIEW], Any)
            .literal("/admin/blogs", &[BLOG_VIEW], Any)
            .literal("/admin/blogs/new", &[BLOG_CREATE], Any)
            .regex(r"^/admin/blogs/.+/edit$", &[BLOG_EDIT], Any)
            .literal("/admin/reports", &[ADMIN_REPORTS_VIEW], Any)
            .literal("/admin/reports/export", &[ADMIN_REPORTS_VIEW, ADMIN_REPORTS_EXPORT], All)
            .literal("/admin/settings", &[ADMIN_SETTINGS_MANAGE], Any)
            .literal("/admin/pages", &[ADMIN_CONTENT_MANAGE], Any)
            .build()
    }

    /// Back-office JSON API served by this crate.
    pub fn admin_api() -> Result<Self, CatalogError> {
        use MatchMode::*;

        RouteCatalog::builder("/api/admin")
            .literal("/api/admin/permissions", &[ADMIN_ROLE_VIEW, ADMIN_USER_ASSIGN_PERMISSIONS], Any)
            .literal("/api/admin/group-roles", &[ADMIN_ROLE_VIEW], Any)
            .template("/api/admin/group-roles/:id", &[ADMIN_ROLE_VIEW], Any)
            .literal("/api/admin/users", &[ADMIN_USER_VIEW, ADMIN_USER_ASSIGN_PERMISSIONS], Any)
            .template(
                "/api/admin/users/:id/group-roles",
                &[ADMIN_USER_ASSIGN_PERMISSIONS, ADMIN_USER_ASSIGN_ROLE],
                Any,
            )
            .template(
                "/api/admin/users/:id/effective-permissions",
                &[ADMIN_USER_VIEW, ADMIN_USER_ASSIGN_PERMISSIONS],
                Any,
            )
            .literal("/api/admin/activity", &[ADMIN_REPORTS_VIEW], Any)
            .build()
    }
}

enum Entry {
    Literal(String),
    Template(String),
    Regex(String),
}

pub struct RouteCatalogBuilder {
    protected_prefix: String,
    entries: Vec<(Entry, Vec<String>, MatchMode)>,
}

impl RouteCatalogBuilder {
    fn push(mut self, entry: Entry, permissions: &[&str], mode: MatchMode) -> Self {
        let permissions = permissions.iter().map(|p| p.to_string()).collect();
        self.entries.push((entry, permissions, mode));
        self
    }

    pub fn literal(self, path: &str, permissions: &[&str], mode: MatchMode) -> Self {
        self.push(Entry::Literal(path.to_string()), permissions, mode)
    }

    pub fn template(self, template: &str, permissions: &[&str], mode: MatchMode) -> Self {
        self.push(Entry::Template(template.to_string()), permissions, mode)
    }

    pub fn regex(self, pattern: &str, permissions: &[&str], mode: MatchMode) -> Self {
        self.push(Entry::Regex(pattern.to_string()), permissions, mode)
    }

    pub fn build(self) -> Result<RouteCatalog, CatalogError> {
        let mut literals = Vec::new();
        let mut patterns = Vec::new();

        for (entry, raw_permissions, mode) in self.entries {
            let matcher = match entry {
                Entry::Literal(path) => RouteMatcher::Literal(normalize_path(&path)),
                Entry::Template(template) => RouteMatcher::Pattern(RoutePattern::template(&template)?),
                Entry::Regex(pattern) => RouteMatcher::Pattern(RoutePattern::regex(&pattern)?),
            };

            let permissions = raw_permissions
                .iter()
                .map(|raw| {
                    Permission::parse(raw).map_err(|source| CatalogError::Permission {
                        route: matcher.describe().to_string(),
                        source,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let rule = RouteRule { matcher, permissions, mode };
            if matches!(rule.matcher, RouteMatcher::Literal(_)) {
                literals.push(rule);
            } else {
                patterns.push(rule);
            }
        }

        // Stable sort keeps declaration order among equally specific patterns.
        patterns.sort_by(|a, b| match (&a.matcher, &b.matcher) {
            (RouteMatcher::Pattern(pa), RouteMatcher::Pattern(pb)) => pb
                .static_segments
                .cmp(&pa.static_segments)
                .then(pb.source.len().cmp(&pa.source.len())),
            _ => std::cmp::Ordering::Equal,
        });

        let mut index = HashMap::new();
        for (position, rule) in literals.iter().enumerate() {
            let path = rule.matcher.describe().to_string();
            if index.insert(path.clone(), position).is_some() {
                return Err(CatalogError::Duplicate(path));
            }
        }

        let mut rules = literals;
        rules.extend(patterns);

        Ok(RouteCatalog {
            protected_prefix: self.protected_prefix,
            literals: index,
            rules,
        })
    }
}

/// Drop query and fragment, and any trailing slash except on the root.
pub fn normalize_path(path: &str) -> String {
    let end = path.find(|c: char| c == '?' || c == '#').unwrap_or(path.len());
    let trimmed = path[..end].trim();
    let without_slash = trimmed.trim_end_matches('/');

    if without_slash.is_empty() {
        return "/".to_string();
    }
    if without_slash.starts_with('/') {
        without_slash.to_string()
    } else {
        format!("/{without_slash}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(rule: Option<&[Permission]>) -> Vec<String> {
        rule.unwrap_or_default().iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_literal_match_wins_over_patterns() {
        let catalog = RouteCatalog::admin_pages().unwrap();
        assert_eq!(
            names(catalog.resolve_rules_for_path("/admin/properties/new")),
            vec![PROPERTY_CREATE]
        );
        assert_eq!(
            names(catalog.resolve_rules_for_path("/admin/blogs/new")),
            vec![BLOG_CREATE]
        );
    }

    #[test]
    fn test_dynamic_segments_resolve_most_specific_first() {
        let catalog = RouteCatalog::admin_pages().unwrap();
        assert_eq!(
            names(catalog.resolve_rules_for_path("/admin/properties/42/edit")),
            vec![PROPERTY_UPDATE]
        );
        assert_eq!(
            names(catalog.resolve_rules_for_path("/admin/properties/42")),
            vec![PROPERTY_VIEW]
        );
        assert_eq!(
            names(catalog.resolve_rules_for_path("/admin/blogs/summer-deals/edit")),
            vec![BLOG_EDIT]
        );
    }

    #[test]
    fn test_declaration_order_does_not_affect_specificity() {
        let catalog = RouteCatalog::builder("/admin")
            .template("/admin/items/:id", &["item:view"], MatchMode::Any)
            .template("/admin/items/:id/edit", &["item:update"], MatchMode::Any)
            .build()
            .unwrap();

        assert_eq!(
            names(catalog.resolve_rules_for_path("/admin/items/7/edit")),
            vec!["item:update"]
        );
    }

    #[test]
    fn test_unmatched_paths_resolve_to_none() {
        let catalog = RouteCatalog::admin_pages().unwrap();
        assert!(catalog.resolve_rule("/admin/unknown").is_none());
        assert!(catalog.resolve_rule("/").is_none());
        assert!(catalog.resolve_rule("/admin/properties/1/rooms/2").is_none());
    }

    #[test]
    fn test_property_ids_must_be_numeric() {
        let catalog = RouteCatalog::admin_pages().unwrap();
        assert!(catalog.resolve_rule("/admin/properties/12").is_some());
        assert!(catalog.resolve_rule("/admin/properties/anything").is_none());
        assert!(catalog.resolve_rule("/admin/properties/abc/edit").is_none());
        assert_eq!(
            names(catalog.resolve_rules_for_path("/admin/properties/create")),
            vec!["property:create"]
        );
    }

    #[test]
    fn test_paths_are_normalized_before_matching() {
        let catalog = RouteCatalog::admin_pages().unwrap();
        assert!(catalog.resolve_rule("/admin/bookings/").is_some());
        assert!(catalog.resolve_rule("/admin/bookings?page=2").is_some());
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("admin/users/"), "/admin/users");
    }

    #[test]
    fn test_protected_prefix_respects_segment_boundary() {
        let catalog = RouteCatalog::admin_pages().unwrap();
        assert!(catalog.is_protected("/admin"));
        assert!(catalog.is_protected("/admin/anything"));
        assert!(!catalog.is_protected("/administrator"));
        assert!(!catalog.is_protected("/properties/1"));
    }

    #[test]
    fn test_regex_rules_are_anchored() {
        let pattern = RoutePattern::regex("/admin/blogs/.+/edit").unwrap();
        assert!(pattern.is_match("/admin/blogs/x/edit"));
        assert!(!pattern.is_match("/prefix/admin/blogs/x/edit"));
        assert!(!pattern.is_match("/admin/blogs/x/edit/extra"));
    }

    #[test]
    fn test_duplicate_literals_are_rejected() {
        let result = RouteCatalog::builder("/admin")
            .literal("/admin/a", &["a:view"], MatchMode::Any)
            .literal("/admin/a/", &["a:view"], MatchMode::Any)
            .build();
        assert!(matches!(result, Err(CatalogError::Duplicate(_))));
    }

    #[test]
    fn test_every_rule_uses_known_permissions() {
        for catalog in [RouteCatalog::admin_pages().unwrap(), RouteCatalog::admin_api().unwrap()] {
            for rule in catalog.rules() {
                for permission in &rule.permissions {
                    assert!(is_known(permission.as_str()), "unknown token {permission}");
                }
            }
        }
    }
}
