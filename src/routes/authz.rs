use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::app::AppState;
use crate::authz::{normalize_path, GuardDecision, KNOWN_PERMISSIONS};
use crate::errors::AppResult;
use crate::jwt::{bearer_token, MaybeAuthUser};
use crate::models::authz::{CatalogPermission, CatalogResponse, GuardOutcome, RouteAccessQuery, RouteAccessResponse};
use crate::session::{SessionInfo, SessionState};

/// Answer the screen guard for the caller, so thin clients can gate navigation.
#[utoipa::path(
    get,
    path = "/api/authz/route-access",
    tag = "Authz",
    params(RouteAccessQuery),
    responses(
        (status = 200, description = "Guard decision for the path", body = RouteAccessResponse),
        (status = 401, description = "Bearer token present but invalid")
    )
)]
pub async fn route_access(
    State(state): State<AppState>,
    headers: HeaderMap,
    MaybeAuthUser(user): MaybeAuthUser,
    Query(query): Query<RouteAccessQuery>,
) -> AppResult<Json<RouteAccessResponse>> {
    let path = normalize_path(&query.path);

    let session = match user {
        Some(user) => SessionState::Authenticated(Arc::new(SessionInfo {
            user_id: user.user_id.to_string(),
            name: user.name,
            role: user.role,
            access_token: bearer_token(&headers).unwrap_or_default().to_string(),
            refresh_token: None,
            permissions: user.permissions,
        })),
        None => SessionState::Anonymous,
    };

    let rule = state.page_catalog.resolve_rule(&path).map(|rule| rule.view());
    let response = match state.page_guard.check(&session, &path) {
        GuardDecision::Allow => RouteAccessResponse {
            path,
            allowed: true,
            decision: GuardOutcome::Allow,
            location: None,
            reason: None,
            rule,
        },
        GuardDecision::Pending => RouteAccessResponse {
            path,
            allowed: false,
            decision: GuardOutcome::Pending,
            location: None,
            reason: None,
            rule,
        },
        GuardDecision::Redirect { location, reason } => RouteAccessResponse {
            path,
            allowed: false,
            decision: GuardOutcome::Redirect,
            location: Some(location),
            reason: Some(reason),
            rule,
        },
    };

    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/authz/catalog",
    tag = "Authz",
    responses((status = 200, description = "Permission vocabulary and route tables", body = CatalogResponse)),
    security(())
)]
pub async fn catalog(State(state): State<AppState>) -> Json<CatalogResponse> {
    let permissions = KNOWN_PERMISSIONS
        .iter()
        .map(|(name, description)| CatalogPermission {
            name: name.to_string(),
            description: description.to_string(),
        })
        .collect();

    Json(CatalogResponse {
        permissions,
        pages: state.page_catalog.rules().iter().map(|rule| rule.view()).collect(),
        api: state.api_catalog.rules().iter().map(|rule| rule.view()).collect(),
    })
}
