mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;
use sqlx::SqlitePool;

use common::{token, ADMIN_MOBILE};

async fn wait_for_event(pool: &SqlitePool, event_name: &str) -> Result<Vec<(String, String)>> {
    // The event listener is async, so poll for a while
    for _ in 0..15 {
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT event_name, description FROM activity_log WHERE event_name = ?")
                .bind(event_name)
                .fetch_all(pool)
                .await?;

        if !rows.is_empty() {
            return Ok(rows);
        }
    }
    Ok(Vec::new())
}

#[tokio::test]
async fn role_changes_are_audited_in_a_verifiable_chain() -> Result<()> {
    let test = common::spawn_app().await?;
    let admin = token(&test.login_admin(ADMIN_MOBILE).await?)?;

    let (status, role) = test
        .request(
            "POST",
            "/api/admin/group-roles",
            Some(&admin),
            Some(json!({ "name": "Housekeeping", "permissions": ["property:room:view"] })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let logs = wait_for_event(&test.pool, "group_role.created").await?;
    assert!(!logs.is_empty(), "Activity log should contain group_role.created event");
    assert_eq!(logs[0].1, "Group role created");

    let (status, _) = test
        .request("DELETE", &format!("/api/admin/group-roles/{}", role["id"].as_str().unwrap_or_default()), Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    let logs = wait_for_event(&test.pool, "group_role.deactivated").await?;
    assert_eq!(logs.len(), 1);

    let severity: String =
        sqlx::query_scalar("SELECT severity FROM activity_log WHERE event_name = 'group_role.deactivated'")
            .fetch_one(&test.pool)
            .await?;
    assert_eq!(severity, "critical");

    assert_eq!(staydesk::db::activity::verify_chain(&test.pool).await?, None);

    // The admin API exposes the same trail, newest first
    let (status, entries) = test.request("GET", "/api/admin/activity?limit=1", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entries.as_array().map(Vec::len), Some(1));
    assert_eq!(entries[0]["event_name"], "group_role.deactivated");

    Ok(())
}

#[tokio::test]
async fn tampering_breaks_the_chain() -> Result<()> {
    let test = common::spawn_app().await?;
    test.login(ADMIN_MOBILE).await?;

    let logs = wait_for_event(&test.pool, "session.login").await?;
    assert!(!logs.is_empty(), "login should be audited");
    assert_eq!(staydesk::db::activity::verify_chain(&test.pool).await?, None);

    sqlx::query("UPDATE activity_log SET properties = '{}' WHERE event_name = 'session.login'")
        .execute(&test.pool)
        .await?;

    assert!(staydesk::db::activity::verify_chain(&test.pool).await?.is_some());

    Ok(())
}
