#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`

use staydesk::config::{AppConfig, OtpConfig};
use staydesk::create_app_with_config;
use staydesk::jwt::JwtConfig;

pub const ADMIN_MOBILE: &str = "+919800000001";
pub const CUSTOMER_MOBILE: &str = "+919800000002";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    // Keeps the database file alive for the test.
    _dir: TempDir,
}

pub async fn spawn_app() -> Result<TestApp> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?;
    migrator.run(&pool).await?;

    let config = AppConfig {
        jwt: JwtConfig::new("test-secret"),
        otp: OtpConfig {
            expose_code: true,
            ..OtpConfig::default()
        },
    };
    let app = create_app_with_config(pool.clone(), config).await?;

    Ok(TestApp { app, pool, _dir: dir })
}

impl TestApp {
    pub async fn request(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        Ok((status, value))
    }

    /// Run the OTP flow for `mobile` and return the login response body.
    pub async fn login(&self, mobile: &str) -> Result<Value> {
        let (status, sent) = self
            .request("POST", "/auth/send-otp", None, Some(json!({ "mobileNumber": mobile })))
            .await?;
        assert_eq!(status, StatusCode::OK, "send-otp failed: {}", sent);
        let code = sent["debug_code"].as_str().context("debug_code missing")?.to_string();

        let (status, login) = self
            .request("POST", "/auth/verify-otp", None, Some(json!({ "mobileNumber": mobile, "otp": code })))
            .await?;
        assert_eq!(status, StatusCode::OK, "verify-otp failed: {}", login);

        Ok(login)
    }

    /// Grant every permission to `mobile`, then log in.
    pub async fn login_admin(&self, mobile: &str) -> Result<Value> {
        staydesk::db::bootstrap_admin(&self.pool, mobile, "Admin").await?;
        self.login(mobile).await
    }
}

pub fn token(login: &Value) -> Result<String> {
    Ok(login["access_token"].as_str().context("missing access_token")?.to_string())
}

pub fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}
