use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::config::OtpConfig;
use crate::errors::{AppError, AppResult};
use crate::utils::{generate_otp, sha256_hex, utc_now};

/// Store a fresh code for `mobile`, replacing any pending one. Returns the plain code.
pub async fn issue(pool: &SqlitePool, mobile: &str, config: &OtpConfig) -> Result<String, sqlx::Error> {
    let code = generate_otp();
    let now = utc_now();
    let expires_at = now + Duration::seconds(config.ttl_secs);

    sqlx::query(
        r#"
        INSERT INTO otp_challenges (mobile, code_hash, expires_at, attempts, created_at)
        VALUES (?, ?, ?, 0, ?)
        ON CONFLICT(mobile) DO UPDATE SET
            code_hash = excluded.code_hash,
            expires_at = excluded.expires_at,
            attempts = 0,
            created_at = excluded.created_at
        "#,
    )
    .bind(mobile)
    .bind(sha256_hex(&code))
    .bind(expires_at)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(code)
}

/// Check a submitted code. Success and exhaustion both burn the challenge.
///
/// Every submission first claims one attempt in a single statement, so
/// concurrent guesses cannot compare more than `max_attempts` times.
pub async fn verify(pool: &SqlitePool, mobile: &str, code: &str, config: &OtpConfig) -> AppResult<()> {
    let claimed: Option<(String, DateTime<Utc>, i64)> = sqlx::query_as(
        r#"
        UPDATE otp_challenges SET attempts = attempts + 1
        WHERE mobile = ? AND attempts < ?
        RETURNING code_hash, expires_at, attempts
        "#,
    )
    .bind(mobile)
    .bind(config.max_attempts)
    .fetch_optional(pool)
    .await?;

    let Some((code_hash, expires_at, attempts)) = claimed else {
        let pending: Option<i64> = sqlx::query_scalar("SELECT attempts FROM otp_challenges WHERE mobile = ?")
            .bind(mobile)
            .fetch_optional(pool)
            .await?;
        return match pending {
            Some(_) => {
                burn(pool, mobile).await?;
                Err(AppError::bad_request("too many attempts, request a new code"))
            }
            None => Err(AppError::bad_request("no pending code for this number")),
        };
    };

    if expires_at <= utc_now() {
        consume(pool, mobile, &code_hash).await?;
        return Err(AppError::bad_request("code has expired"));
    }

    if sha256_hex(code.trim()) != code_hash {
        if attempts >= config.max_attempts {
            consume(pool, mobile, &code_hash).await?;
        }
        tracing::warn!(mobile = %mobile, attempts, "invalid otp submitted");
        return Err(AppError::bad_request("invalid code"));
    }

    // Only the submission that deletes the row logs in
    if !consume(pool, mobile, &code_hash).await? {
        return Err(AppError::bad_request("code has already been used"));
    }
    Ok(())
}

async fn consume(pool: &SqlitePool, mobile: &str, code_hash: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM otp_challenges WHERE mobile = ? AND code_hash = ?")
        .bind(mobile)
        .bind(code_hash)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

async fn burn(pool: &SqlitePool, mobile: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM otp_challenges WHERE mobile = ?")
        .bind(mobile)
        .execute(pool)
        .await?;
    Ok(())
}
