mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use serde_json::json;

use staydesk::config::OtpConfig;
use staydesk::db::otp;
use staydesk::errors::AppError;

use common::{token, CUSTOMER_MOBILE};

#[tokio::test]
async fn otp_login_registers_customer_without_permissions() -> Result<()> {
    let test = common::spawn_app().await?;

    let login = test.login(CUSTOMER_MOBILE).await?;
    assert_eq!(login["user_role"], "customer");
    assert!(login["refresh_token"].as_str().is_some());
    assert_eq!(login["permissions"], json!([]));

    let access = token(&login)?;
    let (status, me) = test.request("GET", "/auth/me", Some(&access), None).await?;
    assert_eq!(status, StatusCode::OK, "me failed: {}", me);
    assert_eq!(me["user"]["mobile"], CUSTOMER_MOBILE);

    Ok(())
}

#[tokio::test]
async fn otp_rejects_wrong_reused_and_malformed_input() -> Result<()> {
    let test = common::spawn_app().await?;

    // Malformed number
    let (status, _) = test
        .request("POST", "/auth/send-otp", None, Some(json!({ "mobileNumber": "12ab" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // No pending code
    let (status, _) = test
        .request("POST", "/auth/verify-otp", None, Some(json!({ "mobileNumber": CUSTOMER_MOBILE, "otp": "123456" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, sent) = test
        .request("POST", "/auth/send-otp", None, Some(json!({ "mobileNumber": CUSTOMER_MOBILE })))
        .await?;
    let code = sent["debug_code"].as_str().context("debug_code missing")?.to_string();
    assert_eq!(code.len(), 6);
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let (status, _) = test
        .request("POST", "/auth/verify-otp", None, Some(json!({ "mobileNumber": CUSTOMER_MOBILE, "otp": wrong })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "wrong code must be rejected");

    // A wrong attempt does not burn the code
    let (status, _) = test
        .request("POST", "/auth/verify-otp", None, Some(json!({ "mobileNumber": CUSTOMER_MOBILE, "otp": code })))
        .await?;
    assert_eq!(status, StatusCode::OK);

    // A used code cannot log in twice
    let (status, _) = test
        .request("POST", "/auth/verify-otp", None, Some(json!({ "mobileNumber": CUSTOMER_MOBILE, "otp": code })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn otp_is_burned_after_too_many_attempts() -> Result<()> {
    let test = common::spawn_app().await?;

    let (_, sent) = test
        .request("POST", "/auth/send-otp", None, Some(json!({ "mobileNumber": CUSTOMER_MOBILE })))
        .await?;
    let code = sent["debug_code"].as_str().context("debug_code missing")?.to_string();
    let wrong = if code == "000000" { "111111" } else { "000000" };

    for _ in 0..5 {
        let (status, _) = test
            .request("POST", "/auth/verify-otp", None, Some(json!({ "mobileNumber": CUSTOMER_MOBILE, "otp": wrong })))
            .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = test
        .request("POST", "/auth/verify-otp", None, Some(json!({ "mobileNumber": CUSTOMER_MOBILE, "otp": code })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "exhausted code must not log in");

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_wrong_guesses_share_the_attempt_budget() -> Result<()> {
    let test = common::spawn_app().await?;
    let config = OtpConfig::default();
    let code = otp::issue(&test.pool, CUSTOMER_MOBILE, &config).await?;
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let mut handles = Vec::new();
    for _ in 0..40 {
        let pool = test.pool.clone();
        let config = config.clone();
        handles.push(tokio::spawn(async move { otp::verify(&pool, CUSTOMER_MOBILE, wrong, &config).await }));
    }

    let mut compared = 0;
    for handle in handles {
        match handle.await? {
            Err(AppError::BadRequest(message)) if message == "invalid code" => compared += 1,
            Err(AppError::BadRequest(_)) => {}
            other => panic!("unexpected verify outcome: {:?}", other),
        }
    }
    assert!(compared <= config.max_attempts, "{} guesses were checked", compared);

    // The budget is spent, so even the right code is refused
    assert!(otp::verify(&test.pool, CUSTOMER_MOBILE, &code, &config).await.is_err());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_code_logs_in_exactly_once_under_concurrency() -> Result<()> {
    let test = common::spawn_app().await?;
    let config = OtpConfig::default();

    for _ in 0..5 {
        let code = otp::issue(&test.pool, CUSTOMER_MOBILE, &config).await?;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let pool = test.pool.clone();
            let config = config.clone();
            let code = code.clone();
            handles.push(tokio::spawn(async move { otp::verify(&pool, CUSTOMER_MOBILE, &code, &config).await }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await?.is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1, "a single-use code must succeed once");
    }

    Ok(())
}

#[tokio::test]
async fn logout_invalidates_access_and_refresh_tokens() -> Result<()> {
    let test = common::spawn_app().await?;

    let login = test.login(CUSTOMER_MOBILE).await?;
    let access = token(&login)?;
    let refresh = login["refresh_token"].as_str().context("missing refresh_token")?.to_string();

    // Access tokens cannot be used as refresh tokens
    let (status, _) = test
        .request("POST", "/auth/refresh", None, Some(json!({ "refresh_token": access })))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, refreshed) = test
        .request("POST", "/auth/refresh", None, Some(json!({ "refresh_token": refresh })))
        .await?;
    assert_eq!(status, StatusCode::OK, "refresh failed: {}", refreshed);

    let (status, _) = test.request("POST", "/auth/logout", Some(&access), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = test.request("GET", "/auth/me", Some(&access), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "closed session must reject its access token");

    let (status, _) = test
        .request("POST", "/auth/refresh", None, Some(json!({ "refresh_token": refresh })))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "closed session must reject its refresh token");

    Ok(())
}

#[tokio::test]
async fn me_requires_bearer_token() -> Result<()> {
    let test = common::spawn_app().await?;

    let (status, body) = test.request("GET", "/auth/me", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = test.request("GET", "/auth/me", Some("not-a-jwt"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}
