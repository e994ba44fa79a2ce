//! Group role administration.
//!
//! Route access is enforced by the admin API guard; write operations also
//! check their action permission. Every change is written to the activity
//! log with Critical severity.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::permissions::{ADMIN_ROLE_CREATE, ADMIN_ROLE_DELETE, ADMIN_ROLE_UPDATE};
use crate::authz::{is_known, MatchMode, Permission};
use crate::db::group_roles::{self, RoleChanges};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::group_role::{
    GroupRole, GroupRoleCreateRequest, GroupRoleListQuery, GroupRoleUpdateRequest, PermissionInfo,
};

/// Only catalog tokens may be granted through the API.
pub(crate) fn validate_permissions(raw: &[String]) -> AppResult<Vec<Permission>> {
    let mut permissions: Vec<Permission> = Vec::with_capacity(raw.len());
    for token in raw {
        let permission = Permission::parse(token)?;
        if !is_known(permission.as_str()) {
            return Err(AppError::bad_request(format!("unknown permission `{permission}`")));
        }
        if !permissions.contains(&permission) {
            permissions.push(permission);
        }
    }
    Ok(permissions)
}

#[utoipa::path(
    get,
    path = "/api/admin/permissions",
    tag = "Admin",
    responses(
        (status = 200, description = "Permission vocabulary", body = Vec<PermissionInfo>),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn list_permissions(State(state): State<AppState>) -> AppResult<Json<Vec<PermissionInfo>>> {
    Ok(Json(group_roles::list_permissions(&state.pool).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/group-roles",
    tag = "Admin",
    params(GroupRoleListQuery),
    responses((status = 200, description = "Group roles", body = Vec<GroupRole>))
)]
pub async fn list_group_roles(
    State(state): State<AppState>,
    Query(query): Query<GroupRoleListQuery>,
) -> AppResult<Json<Vec<GroupRole>>> {
    Ok(Json(group_roles::list(&state.pool, query.include_inactive).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/group-roles",
    tag = "Admin",
    request_body = GroupRoleCreateRequest,
    responses(
        (status = 201, description = "Group role created", body = GroupRole),
        (status = 400, description = "Unknown permission"),
        (status = 409, description = "Name already taken")
    )
)]
pub async fn create_group_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<GroupRoleCreateRequest>,
) -> AppResult<(StatusCode, Json<GroupRole>)> {
    auth.require(&[ADMIN_ROLE_CREATE], MatchMode::All)?;

    let permissions = validate_permissions(&req.permissions)?;
    let role = group_roles::create(&state.pool, &req.name, &permissions).await?;

    tracing::info!(role_id = %role.id, name = %role.name, by = %auth.user_id, "group role created");
    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(auth.user_id),
        &role,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    get,
    path = "/api/admin/group-roles/{id}",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Group role ID")),
    responses(
        (status = 200, description = "Group role", body = GroupRole),
        (status = 404, description = "Group role not found")
    )
)]
pub async fn get_group_role(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<GroupRole>> {
    Ok(Json(group_roles::fetch(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/group-roles/{id}",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Group role ID")),
    request_body = GroupRoleUpdateRequest,
    responses(
        (status = 200, description = "Group role updated", body = GroupRole),
        (status = 404, description = "Group role not found")
    )
)]
pub async fn update_group_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<GroupRoleUpdateRequest>,
) -> AppResult<Json<GroupRole>> {
    auth.require(&[ADMIN_ROLE_UPDATE], MatchMode::All)?;

    let permissions = req.permissions.as_deref().map(validate_permissions).transpose()?;
    let before = group_roles::fetch(&state.pool, id).await?;

    let changes = RoleChanges {
        name: req.name.as_deref(),
        permissions: permissions.as_deref(),
        is_active: req.is_active,
    };
    let role = group_roles::update(&state.pool, id, changes).await?;

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(auth.user_id),
        &role,
        Some(&before),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(role))
}

/// Deactivate rather than delete, so history stays resolvable.
#[utoipa::path(
    delete,
    path = "/api/admin/group-roles/{id}",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Group role ID")),
    responses(
        (status = 200, description = "Group role deactivated", body = GroupRole),
        (status = 404, description = "Group role not found")
    )
)]
pub async fn deactivate_group_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<GroupRole>> {
    auth.require(&[ADMIN_ROLE_DELETE], MatchMode::All)?;

    let before = group_roles::fetch(&state.pool, id).await?;
    let role = group_roles::deactivate(&state.pool, id).await?;

    tracing::info!(role_id = %role.id, by = %auth.user_id, "group role deactivated");
    log_activity_with_context(
        &state.event_bus,
        "deactivated",
        Some(auth.user_id),
        &role,
        Some(&before),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(role))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_permissions_normalizes_and_dedups() {
        let raw = vec!["Booking:View".to_string(), "booking:view".to_string(), "blog:view".to_string()];
        let parsed = validate_permissions(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].as_str(), "booking:view");
    }

    #[test]
    fn test_validate_permissions_rejects_unknown_tokens() {
        assert!(validate_permissions(&["booking:teleport".to_string()]).is_err());
        assert!(validate_permissions(&["not valid".to_string()]).is_err());
    }
}
