mod common;

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tempfile::tempdir;

use staydesk::authz::{DefaultPolicyEvaluator, GuardDecision, RedirectReason, RouteCatalog, RouteGuard};
use staydesk::session::{FileStorage, LoginPayload, SessionState, SessionStore};

use common::ADMIN_MOBILE;

fn page_guard() -> Result<RouteGuard> {
    let catalog = Arc::new(RouteCatalog::admin_pages()?);
    Ok(RouteGuard::new(Arc::new(DefaultPolicyEvaluator::new(catalog))))
}

#[tokio::test]
async fn file_session_survives_restart_and_logout() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("session.json");
    let guard = page_guard()?;

    let payload: LoginPayload = serde_json::from_value(json!({
        "access_token": "access",
        "refresh_token": "refresh",
        "role": "staff",
        "id": 42,
        "permissions": "booking:view, property:view"
    }))?;

    let store = SessionStore::new(Arc::new(FileStorage::new(&path)));
    assert_eq!(guard.check(&store.snapshot(), "/admin/bookings"), GuardDecision::Pending);
    store.login(payload).await?;

    // A second process reading the same file
    let restarted = SessionStore::new(Arc::new(FileStorage::new(&path)));
    assert!(restarted.hydrate().await?);
    let state = restarted.snapshot();
    assert_eq!(state.user_id(), Some("42"));
    assert!(guard.check(&state, "/admin/bookings").is_allowed());
    assert!(guard.check(&state, "/admin/properties/7").is_allowed());
    assert!(matches!(
        guard.check(&state, "/admin/settings"),
        GuardDecision::Redirect { reason: RedirectReason::Forbidden, .. }
    ));

    restarted.logout().await?;
    assert_eq!(restarted.snapshot(), SessionState::Anonymous);

    let after_logout = SessionStore::new(Arc::new(FileStorage::new(&path)));
    after_logout.hydrate().await?;
    assert_eq!(after_logout.snapshot(), SessionState::Anonymous);
    assert!(matches!(
        guard.resolve(&after_logout, "/admin/bookings").await,
        GuardDecision::Redirect { reason: RedirectReason::Unauthenticated, .. }
    ));

    Ok(())
}

#[tokio::test]
async fn server_login_response_feeds_the_session() -> Result<()> {
    let test = common::spawn_app().await?;
    let login = test.login_admin(ADMIN_MOBILE).await?;

    let dir = tempdir()?;
    let store = SessionStore::new(Arc::new(FileStorage::new(dir.path().join("session.json"))));
    let payload: LoginPayload = serde_json::from_value(login)?;
    let info = store.login(payload).await?;

    assert_eq!(info.role, "admin");
    assert_eq!(info.permissions.len(), staydesk::authz::KNOWN_PERMISSIONS.len());
    assert!(page_guard()?.check(&store.snapshot(), "/admin/reports/export").is_allowed());

    Ok(())
}
