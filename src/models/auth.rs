use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};
use crate::models::user::User;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendOtpRequest {
    #[serde(rename = "mobileNumber", alias = "mobile")]
    #[schema(example = "+919876543210")]
    pub mobile_number: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendOtpResponse {
    #[schema(example = "OTP sent")]
    pub message: String,
    /// Seconds until the code expires.
    pub expires_in: i64,
    /// Only present when the server runs with `OTP_EXPOSE_CODE`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    #[serde(rename = "mobileNumber", alias = "mobile")]
    #[schema(example = "+919876543210")]
    pub mobile_number: String,
    #[schema(example = "123456")]
    pub otp: String,
    /// Display name stored on first login.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "customer")]
    pub user_role: String,
    pub id: Uuid,
    pub name: String,
    #[schema(example = json!(["booking:view", "property:view"]))]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user: User,
    pub session_id: Uuid,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Login session row; tokens carry its id.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LoginSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub login_time: DateTime<Utc>,
    pub logout_time: Option<DateTime<Utc>>,
}

impl Loggable for LoginSession {
    fn entity_type() -> &'static str { "session" }
    fn subject_id(&self) -> Uuid { self.user_id }
    fn severity(&self) -> Severity { Severity::Noise }

    fn severity_for_action(&self, _action: &str) -> Severity {
        Severity::Noise
    }
}
