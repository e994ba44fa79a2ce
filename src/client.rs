//! HTTP client for the staydesk API, used by the command-line tool.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::models::auth::{MeResponse, MessageResponse, RefreshResponse, SendOtpResponse};
use crate::session::LoginPayload;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The body did not match the expected shape; carries the JSON path of the mismatch.
    #[error("invalid response at `{path}`: {message}")]
    InvalidResponse { path: String, message: String },
    #[error("authentication required: {0}")]
    Unauthorized(String),
    #[error("permission denied: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("server error ({status}): {body}")]
    Server { status: StatusCode, body: String },
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await?;
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(match status {
                StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
                StatusCode::FORBIDDEN => ClientError::Forbidden(message),
                StatusCode::NOT_FOUND => ClientError::NotFound(message),
                StatusCode::BAD_REQUEST => ClientError::Validation(message),
                status => ClientError::Server { status, body: message },
            });
        }

        let bytes = response.bytes().await?;
        decode(&bytes)
    }

    pub async fn send_otp(&self, mobile: &str) -> ClientResult<SendOtpResponse> {
        let request = self.client.post(self.url("/auth/send-otp")).json(&json!({ "mobileNumber": mobile }));
        self.send(request).await
    }

    pub async fn verify_otp(&self, mobile: &str, otp: &str, name: Option<&str>) -> ClientResult<LoginPayload> {
        let request = self
            .client
            .post(self.url("/auth/verify-otp"))
            .json(&json!({ "mobileNumber": mobile, "otp": otp, "name": name }));
        self.send(request).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> ClientResult<RefreshResponse> {
        let request = self
            .client
            .post(self.url("/auth/refresh"))
            .json(&json!({ "refresh_token": refresh_token }));
        self.send(request).await
    }

    pub async fn me(&self) -> ClientResult<MeResponse> {
        self.send(self.client.get(self.url("/auth/me"))).await
    }

    pub async fn logout(&self) -> ClientResult<MessageResponse> {
        self.send(self.client.post(self.url("/auth/logout"))).await
    }

    /// Ask the server's screen guard about `path`.
    pub async fn route_access(&self, path: &str) -> ClientResult<Value> {
        let request = self
            .client
            .get(self.url("/api/authz/route-access"))
            .query(&[("path", path)]);
        self.send(request).await
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ClientResult<T> {
    let deserializer = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(deserializer).map_err(|err| ClientError::InvalidResponse {
        path: err.path().to_string(),
        message: err.inner().to_string(),
    })
}
