//! Authorization core - permission catalog, evaluator and route guard
//!
//! This module implements the back-office RBAC model:
//! - A closed vocabulary of `<resource>:<action>` permission tokens
//! - Ordered route rule tables for admin screens and the admin API
//! - A stateless evaluator with ALL/ANY semantics
//! - A route guard that fails closed under protected prefixes

mod catalog;
mod evaluator;
mod guard;
pub mod middleware;
mod permission;

pub use catalog::{
    is_known, normalize_path, CatalogError, MatchMode, RouteCatalog, RouteCatalogBuilder, RouteMatcher,
    RoutePattern, RouteRule, RouteRuleView, KNOWN_PERMISSIONS,
};
pub use evaluator::{DefaultPolicyEvaluator, DenyReason, PolicyEvaluator, RouteAccess};
pub use guard::{require_permission, GuardDecision, RedirectReason, RouteGuard};
pub use permission::{parse_permissions, GrantedPermissions, Permission, PermissionError};

/// Well-known role names
pub mod roles {
    pub const CUSTOMER: &str = "customer";
    pub const ADMIN: &str = "admin";
    pub const SUPER_ADMIN_GROUP: &str = "Super Admin";
}

/// Well-known permission names
pub mod permissions {
    // Users
    pub const ADMIN_USER: &str = "admin:user";
    pub const ADMIN_USER_VIEW: &str = "admin:user:view";
    pub const ADMIN_USER_CREATE: &str = "admin:user:create";
    pub const ADMIN_USER_UPDATE: &str = "admin:user:update";
    pub const ADMIN_USER_DELETE: &str = "admin:user:delete";
    pub const ADMIN_USER_ASSIGN_PERMISSIONS: &str = "admin:user:assign-permissions";
    pub const ADMIN_USER_ASSIGN_ROLE: &str = "admin:user:assign-role";

    // Back office
    pub const ADMIN_SETTINGS_MANAGE: &str = "admin:settings:manage";
    pub const ADMIN_CONTENT_MANAGE: &str = "admin:content:manage";
    pub const ADMIN_REPORTS_VIEW: &str = "admin:reports:view";
    pub const ADMIN_REPORTS_EXPORT: &str = "admin:reports:export";
    pub const ADMIN_DASHBOARD_VIEW: &str = "admin:dashboard:view";

    // Group roles
    pub const ADMIN_ROLE_VIEW: &str = "admin:role:view";
    pub const ADMIN_ROLE_CREATE: &str = "admin:role:create";
    pub const ADMIN_ROLE_UPDATE: &str = "admin:role:update";
    pub const ADMIN_ROLE_DELETE: &str = "admin:role:delete";

    // Offers
    pub const ADMIN_OFFER_VIEW: &str = "admin:offer:view";
    pub const ADMIN_OFFER_CREATE: &str = "admin:offer:create";
    pub const ADMIN_OFFER_UPDATE: &str = "admin:offer:update";
    pub const ADMIN_OFFER_DELETE: &str = "admin:offer:delete";

    // Expenses
    pub const ADMIN_EXPENSE_VIEW: &str = "admin:expense:view";
    pub const ADMIN_EXPENSE_CREATE: &str = "admin:expense:create";
    pub const ADMIN_EXPENSE_UPDATE: &str = "admin:expense:update";
    pub const ADMIN_EXPENSE_DELETE: &str = "admin:expense:delete";

    // Properties
    pub const PROPERTY_VIEW: &str = "property:view";
    pub const PROPERTY_CREATE: &str = "property:create";
    pub const PROPERTY_UPDATE: &str = "property:update";
    pub const PROPERTY_DELETE: &str = "property:delete";
    pub const PROPERTY_AMENITY_VIEW: &str = "property:amenity:view";
    pub const PROPERTY_AMENITY_CREATE: &str = "property:amenity:create";
    pub const PROPERTY_AMENITY_UPDATE: &str = "property:amenity:update";
    pub const PROPERTY_AMENITY_DELETE: &str = "property:amenity:delete";
    pub const PROPERTY_RULE_VIEW: &str = "property:rule:view";
    pub const PROPERTY_RULE_CREATE: &str = "property:rule:create";
    pub const PROPERTY_RULE_UPDATE: &str = "property:rule:update";
    pub const PROPERTY_RULE_DELETE: &str = "property:rule:delete";
    pub const PROPERTY_DOCUMENTATION_VIEW: &str = "property:documentation:view";
    pub const PROPERTY_DOCUMENTATION_CREATE: &str = "property:documentation:create";
    pub const PROPERTY_DOCUMENTATION_UPDATE: &str = "property:documentation:update";
    pub const PROPERTY_DOCUMENTATION_DELETE: &str = "property:documentation:delete";
    pub const PROPERTY_ROOM_VIEW: &str = "property:room:view";
    pub const PROPERTY_ROOM_CREATE: &str = "property:room:create";
    pub const PROPERTY_ROOM_UPDATE: &str = "property:room:update";
    pub const PROPERTY_ROOM_DELETE: &str = "property:room:delete";

    // Bookings
    pub const BOOKING_VIEW: &str = "booking:view";
    pub const BOOKING_CREATE: &str = "booking:create";
    pub const BOOKING_UPDATE: &str = "booking:update";
    pub const BOOKING_DELETE: &str = "booking:delete";

    // Reviews
    pub const REVIEW_VIEW: &str = "review:view";
    pub const REVIEW_CREATE: &str = "review:create";
    pub const REVIEW_UPDATE: &str = "review:update";
    pub const REVIEW_DELETE: &str = "review:delete";
    pub const REPLY_VIEW: &str = "reply:view";
    pub const REPLY_CREATE: &str = "reply:create";
    pub const REPLY_UPDATE: &str = "reply:update";
    pub const REPLY_DELETE: &str = "reply:delete";

    // Blog
    pub const BLOG_VIEW: &str = "blog:view";
    pub const BLOG_CREATE: &str = "blog:create";
    pub const BLOG_EDIT: &str = "blog:edit";
    pub const BLOG_DELETE: &str = "blog:delete";
    pub const BLOG_PUBLISH: &str = "blog:publish";
}
