use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::authz::{RedirectReason, RouteRuleView};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RouteAccessQuery {
    /// Screen path, e.g. `/admin/bookings`.
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GuardOutcome {
    Allow,
    Pending,
    Redirect,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteAccessResponse {
    #[schema(example = "/admin/bookings")]
    pub path: String,
    pub allowed: bool,
    pub decision: GuardOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RedirectReason>,
    /// Rule that governs the path, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<RouteRuleView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogPermission {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogResponse {
    pub permissions: Vec<CatalogPermission>,
    pub pages: Vec<RouteRuleView>,
    pub api: Vec<RouteRuleView>,
}
