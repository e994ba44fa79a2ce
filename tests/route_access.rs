mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use serde_json::json;

use common::{token, ADMIN_MOBILE, CUSTOMER_MOBILE};

#[tokio::test]
async fn anonymous_callers_are_sent_to_login() -> Result<()> {
    let test = common::spawn_app().await?;

    let (status, body) = test
        .request("GET", "/api/authz/route-access?path=/admin/bookings/", None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], false);
    assert_eq!(body["decision"], "redirect");
    assert_eq!(body["reason"], "unauthenticated");
    assert_eq!(body["location"], "/admin/login?next=/admin/bookings");

    // Login and denied screens are always reachable
    let (_, body) = test.request("GET", "/api/authz/route-access?path=/admin/login", None, None).await?;
    assert_eq!(body["decision"], "allow");

    // Public pages need no grants
    let (_, body) = test.request("GET", "/api/authz/route-access?path=/properties", None, None).await?;
    assert_eq!(body["allowed"], true);

    Ok(())
}

#[tokio::test]
async fn screen_access_follows_granted_permissions() -> Result<()> {
    let test = common::spawn_app().await?;
    let admin = token(&test.login_admin(ADMIN_MOBILE).await?)?;

    let (_, role) = test
        .request(
            "POST",
            "/api/admin/group-roles",
            Some(&admin),
            Some(json!({ "name": "Reports", "permissions": ["admin:reports:view", "blog:edit"] })),
        )
        .await?;
    let customer = test.login(CUSTOMER_MOBILE).await?;
    let customer_id = customer["id"].as_str().context("missing id")?;
    test.request(
        "PUT",
        &format!("/api/admin/users/{}/group-roles", customer_id),
        Some(&admin),
        Some(json!({ "group_role_ids": [role["id"]] })),
    )
    .await?;
    let staff = token(&test.login(CUSTOMER_MOBILE).await?)?;

    let body = check(&test, &staff, "/admin/reports").await?;
    assert_eq!(body["decision"], "allow");
    assert_eq!(body["rule"]["mode"], "any");

    // Export needs both view and export
    let body = check(&test, &staff, "/admin/reports/export").await?;
    assert_eq!(body["decision"], "redirect");
    assert_eq!(body["reason"], "forbidden");
    assert_eq!(body["location"], "/access-denied");

    let body = check(&test, &staff, "/admin/blogs/summer-offers/edit").await?;
    assert_eq!(body["allowed"], true);

    // Ungoverned admin screens fail closed
    let body = check(&test, &staff, "/admin/secret-tools").await?;
    assert_eq!(body["allowed"], false);
    assert_eq!(body["reason"], "forbidden");

    // The full admin reaches export
    let (_, body) = test
        .request("GET", "/api/authz/route-access?path=/admin/reports/export", Some(&admin), None)
        .await?;
    assert_eq!(body["allowed"], true);

    Ok(())
}

async fn check(test: &common::TestApp, token: &str, path: &str) -> Result<serde_json::Value> {
    let (status, body) = test
        .request("GET", &format!("/api/authz/route-access?path={}", path), Some(token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(body)
}

#[tokio::test]
async fn catalog_lists_vocabulary_and_tables() -> Result<()> {
    let test = common::spawn_app().await?;

    let (status, body) = test.request("GET", "/api/authz/catalog", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["permissions"].as_array().map(Vec::len),
        Some(staydesk::authz::KNOWN_PERMISSIONS.len())
    );
    assert!(body["pages"].as_array().map(|p| !p.is_empty()).unwrap_or(false));
    assert!(body["api"].as_array().map(|p| !p.is_empty()).unwrap_or(false));

    Ok(())
}
