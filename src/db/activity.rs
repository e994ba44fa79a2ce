use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::activity::{ActivityEntry, DbActivityEntry};

#[derive(Debug, Clone)]
pub struct NewActivity<'a> {
    pub event_name: &'a str,
    pub description: &'a str,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    pub severity: &'a str,
    pub properties: &'a str,
}

/// SHA256(prev_hash || properties)
pub fn chain_hash(prev_hash: Option<&str>, properties: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(properties.as_bytes());
    hex::encode(hasher.finalize())
}

/// Append one entry to the hash chain. Returns the new entry's hash.
pub async fn append(pool: &SqlitePool, entry: NewActivity<'_>) -> Result<String, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let prev_hash: Option<String> = sqlx::query_scalar("SELECT hash FROM activity_log ORDER BY seq DESC LIMIT 1")
        .fetch_optional(&mut *tx)
        .await?;
    let hash = chain_hash(prev_hash.as_deref(), entry.properties);

    sqlx::query(
        r#"
        INSERT INTO activity_log (id, event_name, description, actor_id, subject_id, occurred_at, severity, properties, prev_hash, hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.event_name)
    .bind(entry.description)
    .bind(entry.actor_id)
    .bind(entry.subject_id)
    .bind(entry.occurred_at)
    .bind(entry.severity)
    .bind(entry.properties)
    .bind(&prev_hash)
    .bind(&hash)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(hash)
}

/// Newest first.
pub async fn list(pool: &SqlitePool, limit: i64, subject_id: Option<Uuid>) -> Result<Vec<ActivityEntry>, sqlx::Error> {
    let rows = match subject_id {
        Some(subject_id) => {
            sqlx::query_as::<_, DbActivityEntry>(
                r#"
                SELECT id, event_name, description, actor_id, subject_id, occurred_at, severity, properties, hash
                FROM activity_log WHERE subject_id = ? ORDER BY seq DESC LIMIT ?
                "#,
            )
            .bind(subject_id)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, DbActivityEntry>(
                r#"
                SELECT id, event_name, description, actor_id, subject_id, occurred_at, severity, properties, hash
                FROM activity_log ORDER BY seq DESC LIMIT ?
                "#,
            )
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows.into_iter().map(ActivityEntry::from).collect())
}

/// Recompute the chain. Returns the `seq` of the first tampered row, if any.
pub async fn verify_chain(pool: &SqlitePool) -> Result<Option<i64>, sqlx::Error> {
    let rows: Vec<(i64, String, Option<String>, String)> =
        sqlx::query_as("SELECT seq, properties, prev_hash, hash FROM activity_log ORDER BY seq ASC")
            .fetch_all(pool)
            .await?;

    let mut previous: Option<String> = None;
    for (seq, properties, prev_hash, hash) in rows {
        if prev_hash != previous || chain_hash(previous.as_deref(), &properties) != hash {
            tracing::warn!(seq, "activity log chain broken");
            return Ok(Some(seq));
        }
        previous = Some(hash);
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_hash_depends_on_previous() {
        let first = chain_hash(None, "{}");
        let second = chain_hash(Some(&first), "{}");
        assert_ne!(first, second);
        assert_eq!(first.len(), 64);
    }
}
