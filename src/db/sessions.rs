use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::auth::LoginSession;
use crate::utils::utc_now;

pub async fn open(pool: &SqlitePool, user_id: Uuid) -> Result<LoginSession, sqlx::Error> {
    let session = LoginSession {
        id: Uuid::new_v4(),
        user_id,
        login_time: utc_now(),
        logout_time: None,
    };

    sqlx::query("INSERT INTO user_sessions (id, user_id, login_time, logout_time) VALUES (?, ?, ?, NULL)")
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.login_time)
        .execute(pool)
        .await?;

    Ok(session)
}

/// Unknown sessions count as closed.
pub async fn is_open(pool: &SqlitePool, session_id: Uuid) -> Result<bool, sqlx::Error> {
    let open: Option<bool> = sqlx::query_scalar("SELECT logout_time IS NULL FROM user_sessions WHERE id = ?")
        .bind(session_id)
        .fetch_optional(pool)
        .await?;

    Ok(open.unwrap_or(false))
}

/// Stamp the logout time. Returns the closed session, or `None` if it was already closed.
pub async fn close(pool: &SqlitePool, session_id: Uuid) -> Result<Option<LoginSession>, sqlx::Error> {
    let closed = sqlx::query("UPDATE user_sessions SET logout_time = ? WHERE id = ? AND logout_time IS NULL")
        .bind(utc_now())
        .bind(session_id)
        .execute(pool)
        .await?
        .rows_affected();

    if closed == 0 {
        return Ok(None);
    }

    sqlx::query_as::<_, LoginSession>(
        "SELECT id, user_id, login_time, logout_time FROM user_sessions WHERE id = ?",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
}
