use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{require_permission, GrantedPermissions, MatchMode};
use crate::config::env_parse;
use crate::db;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub access_exp_minutes: i64,
    pub refresh_exp_hours: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            access_exp_minutes: 60,
            refresh_exp_hours: 168,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        if secret.trim().is_empty() {
            return Err(AppError::configuration("JWT_SECRET must not be empty"));
        }

        let defaults = Self::new(secret);
        Ok(Self {
            access_exp_minutes: env_parse("JWT_EXP_MINUTES", defaults.access_exp_minutes)?,
            refresh_exp_hours: env_parse("JWT_REFRESH_EXP_HOURS", defaults.refresh_exp_hours)?,
            ..defaults
        })
    }

    pub fn encode(&self, subject: &TokenSubject<'_>, kind: TokenKind) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = match kind {
            TokenKind::Access => now + Duration::minutes(self.access_exp_minutes),
            TokenKind::Refresh => now + Duration::hours(self.refresh_exp_hours),
        };

        let claims = Claims {
            sub: subject.user_id,
            sid: subject.session_id,
            role: subject.role.to_string(),
            name: subject.name.to_string(),
            permissions: subject.permissions.to_storage(),
            kind,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    /// Decode and check that the token is of the expected kind.
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let claims = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))?;

        if claims.kind != expected {
            return Err(AppError::token(format!("expected a {} token", expected.as_str())));
        }
        Ok(claims)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Who a token is issued for.
#[derive(Debug, Clone, Copy)]
pub struct TokenSubject<'a> {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub role: &'a str,
    pub name: &'a str,
    pub permissions: &'a GrantedPermissions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    /// Login session the token belongs to.
    pub sid: Uuid,
    pub role: String,
    pub name: String,
    /// Comma-joined granted permissions.
    pub permissions: String,
    pub kind: TokenKind,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn granted(&self) -> GrantedPermissions {
        GrantedPermissions::from_storage(&self.permissions)
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub role: String,
    pub name: String,
    pub permissions: GrantedPermissions,
}

impl AuthUser {
    /// Validate the bearer token and the login session it belongs to.
    pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<Self> {
        let token = bearer_token(headers).ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;
        let claims = state.jwt.decode(token, TokenKind::Access)?;

        if !db::sessions::is_open(&state.pool, claims.sid).await? {
            return Err(AppError::unauthorized("session has been closed"));
        }

        Ok(AuthUser {
            user_id: claims.sub,
            session_id: claims.sid,
            permissions: claims.granted(),
            role: claims.role,
            name: claims.name,
        })
    }

    /// Action-level permission check for handlers.
    pub fn require(&self, required: &[&str], mode: MatchMode) -> AppResult<()> {
        require_permission(Some(&self.permissions), required, mode).map_err(|reason| {
            tracing::warn!(user_id = %self.user_id, required = ?required, "action denied");
            AppError::from(reason)
        })
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Already authenticated by the admin route middleware.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        AuthUser::authenticate(state, &parts.headers).await
    }
}

/// Bearer auth that tolerates anonymous callers. A token that is present but invalid is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if parts.headers.get(axum::http::header::AUTHORIZATION).is_none() {
            return Ok(MaybeAuthUser(None));
        }

        AuthUser::authenticate(state, &parts.headers).await.map(|user| MaybeAuthUser(Some(user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::parse_permissions;

    fn subject<'a>(permissions: &'a GrantedPermissions) -> TokenSubject<'a> {
        TokenSubject {
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            role: "admin",
            name: "Asha",
            permissions,
        }
    }

    #[test]
    fn test_access_token_carries_permissions() {
        let config = JwtConfig::new("test-secret");
        let granted: GrantedPermissions = parse_permissions(["booking:view", "blog:view"]).into_iter().collect();

        let token = config.encode(&subject(&granted), TokenKind::Access).unwrap();
        let claims = config.decode(&token, TokenKind::Access).unwrap();

        assert_eq!(claims.permissions, "blog:view,booking:view");
        assert_eq!(claims.granted(), granted);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let config = JwtConfig::new("test-secret");
        let granted = GrantedPermissions::new();
        let token = config.encode(&subject(&granted), TokenKind::Refresh).unwrap();

        assert!(config.decode(&token, TokenKind::Access).is_err());
        assert!(config.decode(&token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let granted = GrantedPermissions::new();
        let token = JwtConfig::new("one").encode(&subject(&granted), TokenKind::Access).unwrap();
        assert!(JwtConfig::new("two").decode(&token, TokenKind::Access).is_err());
    }
}
