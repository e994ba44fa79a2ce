use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::roles::CUSTOMER;
use crate::errors::{AppError, AppResult};
use crate::models::user::User;
use crate::utils::utc_now;

const USER_COLUMNS: &str = "id, mobile, name, user_role, created_at, updated_at";

pub async fn find_by_mobile(pool: &SqlitePool, mobile: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE mobile = ?"))
        .bind(mobile)
        .fetch_optional(pool)
        .await
}

pub async fn fetch(pool: &SqlitePool, user_id: Uuid) -> AppResult<User> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, mobile"))
        .fetch_all(pool)
        .await
}

/// Look up a user by mobile number, registering a customer on first sight.
/// The flag is true when the user was created by this call.
pub async fn get_or_create(pool: &SqlitePool, mobile: &str) -> Result<(User, bool), sqlx::Error> {
    let now = utc_now();
    let result = sqlx::query(
        "INSERT OR IGNORE INTO users (id, mobile, name, user_role, created_at, updated_at) VALUES (?, ?, '', ?, ?, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(mobile)
    .bind(CUSTOMER)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let user = find_by_mobile(pool, mobile).await?.ok_or(sqlx::Error::RowNotFound)?;
    Ok((user, result.rows_affected() > 0))
}

pub async fn update_profile(
    pool: &SqlitePool,
    user_id: Uuid,
    name: Option<&str>,
    user_role: Option<&str>,
) -> AppResult<User> {
    let current = fetch(pool, user_id).await?;
    let name = name.map(str::trim).unwrap_or(current.name.as_str());
    let user_role = user_role.unwrap_or(current.user_role.as_str());

    sqlx::query("UPDATE users SET name = ?, user_role = ?, updated_at = ? WHERE id = ?")
        .bind(name)
        .bind(user_role)
        .bind(utc_now())
        .bind(user_id)
        .execute(pool)
        .await?;

    fetch(pool, user_id).await
}
