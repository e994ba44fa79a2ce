use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::authz::{parse_permissions, GrantedPermissions, Permission};
use crate::errors::{AppError, AppResult};
use crate::models::group_role::{DbGroupRole, GroupRole, PermissionInfo};
use crate::utils::utc_now;

const ROLE_COLUMNS: &str = "id, name, is_active, created_at, updated_at";

/// Partial update of a group role; `None` leaves a field untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleChanges<'a> {
    pub name: Option<&'a str>,
    pub permissions: Option<&'a [Permission]>,
    pub is_active: Option<bool>,
}

pub async fn list_permissions(pool: &SqlitePool) -> Result<Vec<PermissionInfo>, sqlx::Error> {
    sqlx::query_as::<_, PermissionInfo>("SELECT name, description, is_active FROM permissions ORDER BY name")
        .fetch_all(pool)
        .await
}

async fn permissions_of(pool: &SqlitePool, role_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT permission_name FROM group_role_permissions WHERE group_role_id = ? ORDER BY permission_name",
    )
    .bind(role_id)
    .fetch_all(pool)
    .await
}

async fn with_permissions(pool: &SqlitePool, rows: Vec<DbGroupRole>) -> Result<Vec<GroupRole>, sqlx::Error> {
    let mut roles = Vec::with_capacity(rows.len());
    for row in rows {
        let permissions = permissions_of(pool, row.id).await?;
        roles.push(row.with_permissions(permissions));
    }
    Ok(roles)
}

pub async fn list(pool: &SqlitePool, include_inactive: bool) -> Result<Vec<GroupRole>, sqlx::Error> {
    let sql = if include_inactive {
        format!("SELECT {ROLE_COLUMNS} FROM group_roles ORDER BY name")
    } else {
        format!("SELECT {ROLE_COLUMNS} FROM group_roles WHERE is_active = 1 ORDER BY name")
    };

    let rows = sqlx::query_as::<_, DbGroupRole>(&sql).fetch_all(pool).await?;
    with_permissions(pool, rows).await
}

pub async fn fetch(pool: &SqlitePool, role_id: Uuid) -> AppResult<GroupRole> {
    let row = sqlx::query_as::<_, DbGroupRole>(&format!("SELECT {ROLE_COLUMNS} FROM group_roles WHERE id = ?"))
        .bind(role_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("group role not found"))?;

    let permissions = permissions_of(pool, row.id).await?;
    Ok(row.with_permissions(permissions))
}

pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<GroupRole>, sqlx::Error> {
    let row = sqlx::query_as::<_, DbGroupRole>(&format!(
        "SELECT {ROLE_COLUMNS} FROM group_roles WHERE name = ? COLLATE NOCASE"
    ))
    .bind(name.trim())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let permissions = permissions_of(pool, row.id).await?;
            Ok(Some(row.with_permissions(permissions)))
        }
        None => Ok(None),
    }
}

async fn ensure_name_available(pool: &SqlitePool, name: &str, except: Option<Uuid>) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::bad_request("group role name must not be empty"));
    }

    if let Some(existing) = find_by_name(pool, name).await? {
        if Some(existing.id) != except {
            return Err(AppError::conflict(format!("group role `{name}` already exists")));
        }
    }
    Ok(())
}

/// Concurrent writers can pass `ensure_name_available` together; the
/// NOCASE unique index decides, and the loser gets a conflict.
fn name_taken(name: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
    move |err| {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AppError::conflict(format!("group role `{name}` already exists"));
            }
        }
        AppError::Database(err)
    }
}

async fn replace_permissions(
    tx: &mut Transaction<'_, Sqlite>,
    role_id: Uuid,
    permissions: &[Permission],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM group_role_permissions WHERE group_role_id = ?")
        .bind(role_id)
        .execute(&mut **tx)
        .await?;

    for permission in permissions {
        sqlx::query("INSERT OR IGNORE INTO group_role_permissions (group_role_id, permission_name) VALUES (?, ?)")
            .bind(role_id)
            .bind(permission.as_str())
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

pub async fn create(pool: &SqlitePool, name: &str, permissions: &[Permission]) -> AppResult<GroupRole> {
    let name = name.trim();
    ensure_name_available(pool, name, None).await?;

    let id = Uuid::new_v4();
    let now = utc_now();
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO group_roles (id, name, is_active, created_at, updated_at) VALUES (?, ?, 1, ?, ?)")
        .bind(id)
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(name_taken(name))?;

    replace_permissions(&mut tx, id, permissions).await?;
    tx.commit().await?;

    fetch(pool, id).await
}

pub async fn update(pool: &SqlitePool, role_id: Uuid, changes: RoleChanges<'_>) -> AppResult<GroupRole> {
    let current = fetch(pool, role_id).await?;

    let name = match changes.name.map(str::trim) {
        Some(name) if name != current.name => {
            ensure_name_available(pool, name, Some(role_id)).await?;
            name.to_string()
        }
        _ => current.name.clone(),
    };
    let is_active = changes.is_active.unwrap_or(current.is_active);

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE group_roles SET name = ?, is_active = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(is_active)
        .bind(utc_now())
        .bind(role_id)
        .execute(&mut *tx)
        .await
        .map_err(name_taken(&name))?;

    if let Some(permissions) = changes.permissions {
        replace_permissions(&mut tx, role_id, permissions).await?;
    }
    tx.commit().await?;

    fetch(pool, role_id).await
}

/// Soft delete: the role stays for history but stops granting anything.
pub async fn deactivate(pool: &SqlitePool, role_id: Uuid) -> AppResult<GroupRole> {
    let changes = RoleChanges {
        is_active: Some(false),
        ..RoleChanges::default()
    };
    update(pool, role_id, changes).await
}

pub async fn for_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<GroupRole>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DbGroupRole>(
        r#"
        SELECT gr.id, gr.name, gr.is_active, gr.created_at, gr.updated_at
        FROM group_roles gr
        INNER JOIN user_group_roles ugr ON ugr.group_role_id = gr.id
        WHERE ugr.user_id = ?
        ORDER BY gr.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    with_permissions(pool, rows).await
}

pub async fn assign_to_user(pool: &SqlitePool, user_id: Uuid, role_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO user_group_roles (user_id, group_role_id, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(role_id)
        .bind(utc_now())
        .execute(pool)
        .await?;
    Ok(())
}

/// Replace the user's group roles with exactly `role_ids`.
pub async fn set_for_user(pool: &SqlitePool, user_id: Uuid, role_ids: &[Uuid]) -> AppResult<Vec<GroupRole>> {
    for role_id in role_ids {
        fetch(pool, *role_id).await?;
    }

    let now = utc_now();
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM user_group_roles WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    for role_id in role_ids {
        sqlx::query("INSERT OR IGNORE INTO user_group_roles (user_id, group_role_id, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(*role_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(for_user(pool, user_id).await?)
}

/// Union of active permissions over the user's active group roles.
pub async fn effective_permissions(pool: &SqlitePool, user_id: Uuid) -> Result<GrantedPermissions, sqlx::Error> {
    let names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT grp.permission_name
        FROM user_group_roles ugr
        INNER JOIN group_roles gr ON gr.id = ugr.group_role_id AND gr.is_active = 1
        INNER JOIN group_role_permissions grp ON grp.group_role_id = gr.id
        INNER JOIN permissions p ON p.name = grp.permission_name AND p.is_active = 1
        WHERE ugr.user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(parse_permissions(names).into_iter().collect())
}
