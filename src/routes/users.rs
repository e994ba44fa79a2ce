use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::permissions::{ADMIN_USER_ASSIGN_PERMISSIONS, ADMIN_USER_ASSIGN_ROLE};
use crate::authz::MatchMode;
use crate::db::{group_roles, users};
use crate::errors::AppResult;
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::group_role::{EffectivePermissions, UserGroupRoles, UserGroupRolesRequest};
use crate::models::user::User;

#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "Admin",
    responses(
        (status = 200, description = "All users", body = Vec<User>),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(users::list(&state.pool).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{id}/group-roles",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Group roles assigned to the user", body = UserGroupRoles),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_group_roles(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserGroupRoles>> {
    users::fetch(&state.pool, user_id).await?;
    let group_roles = group_roles::for_user(&state.pool, user_id).await?;
    Ok(Json(UserGroupRoles { user_id, group_roles }))
}

/// Replace the user's group roles. New permissions apply from the next token refresh.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/group-roles",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UserGroupRolesRequest,
    responses(
        (status = 200, description = "Assignment replaced", body = UserGroupRoles),
        (status = 404, description = "User or group role not found")
    )
)]
pub async fn set_user_group_roles(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UserGroupRolesRequest>,
) -> AppResult<Json<UserGroupRoles>> {
    auth.require(&[ADMIN_USER_ASSIGN_PERMISSIONS, ADMIN_USER_ASSIGN_ROLE], MatchMode::Any)?;

    users::fetch(&state.pool, user_id).await?;
    let before = UserGroupRoles {
        user_id,
        group_roles: group_roles::for_user(&state.pool, user_id).await?,
    };

    let assigned = UserGroupRoles {
        user_id,
        group_roles: group_roles::set_for_user(&state.pool, user_id, &req.group_role_ids).await?,
    };

    tracing::info!(
        user_id = %user_id,
        roles = assigned.group_roles.len(),
        by = %auth.user_id,
        "user group roles replaced"
    );
    log_activity_with_context(
        &state.event_bus,
        "assigned",
        Some(auth.user_id),
        &assigned,
        Some(&before),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(assigned))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{id}/effective-permissions",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Union of active permissions over active group roles", body = EffectivePermissions),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_effective_permissions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<EffectivePermissions>> {
    users::fetch(&state.pool, user_id).await?;
    let granted = group_roles::effective_permissions(&state.pool, user_id).await?;
    Ok(Json(EffectivePermissions {
        user_id,
        permissions: granted.to_strings(),
    }))
}
