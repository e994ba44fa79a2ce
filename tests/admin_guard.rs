mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{token, ADMIN_MOBILE, CUSTOMER_MOBILE};

#[tokio::test]
async fn admin_api_requires_authentication() -> Result<()> {
    let test = common::spawn_app().await?;

    for uri in ["/api/admin/group-roles", "/api/admin/users", "/api/admin/no-such-endpoint"] {
        let (status, _) = test.request("GET", uri, None, None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} must require a token", uri);
    }

    Ok(())
}

#[tokio::test]
async fn customer_without_grants_is_forbidden() -> Result<()> {
    let test = common::spawn_app().await?;
    let customer = token(&test.login(CUSTOMER_MOBILE).await?)?;

    let (status, body) = test.request("GET", "/api/admin/group-roles", Some(&customer), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = test
        .request("POST", "/api/admin/group-roles", Some(&customer), Some(json!({ "name": "Sneaky" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn admin_can_use_governed_endpoints_but_not_unknown_ones() -> Result<()> {
    let test = common::spawn_app().await?;
    let admin = token(&test.login_admin(ADMIN_MOBILE).await?)?;

    let (status, permissions) = test.request("GET", "/api/admin/permissions", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        permissions.as_array().map(Vec::len),
        Some(staydesk::authz::KNOWN_PERMISSIONS.len())
    );

    let (status, users) = test.request("GET", "/api/admin/users", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().map(Vec::len), Some(1));

    // Ungoverned paths under the admin prefix fail closed, even for admins
    let (status, _) = test.request("GET", "/api/admin/no-such-endpoint", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn grants_in_token_follow_group_role_membership() -> Result<()> {
    let test = common::spawn_app().await?;
    let admin = token(&test.login_admin(ADMIN_MOBILE).await?)?;

    let (status, role) = test
        .request(
            "POST",
            "/api/admin/group-roles",
            Some(&admin),
            Some(json!({ "name": "Auditor", "permissions": ["admin:reports:view"] })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", role);

    let customer_login = test.login(CUSTOMER_MOBILE).await?;
    let customer_id = customer_login["id"].as_str().unwrap_or_default().to_string();

    let (status, _) = test
        .request(
            "PUT",
            &format!("/api/admin/users/{}/group-roles", customer_id),
            Some(&admin),
            Some(json!({ "group_role_ids": [role["id"]] })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    // The old token predates the assignment
    let stale = token(&customer_login)?;
    let (status, _) = test.request("GET", "/api/admin/activity", Some(&stale), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let fresh = token(&test.login(CUSTOMER_MOBILE).await?)?;
    let (status, _) = test.request("GET", "/api/admin/activity", Some(&fresh), None).await?;
    assert_eq!(status, StatusCode::OK);

    // Reports access does not open role management
    let (status, _) = test.request("GET", "/api/admin/group-roles", Some(&fresh), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}
