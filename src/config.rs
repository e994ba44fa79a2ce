use crate::errors::AppError;
use crate::jwt::JwtConfig;

/// One-time password settings for the mobile login flow.
#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub ttl_secs: i64,
    pub max_attempts: i64,
    /// Return the generated code in the send-otp response (development only).
    pub expose_code: bool,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_attempts: 5,
            expose_code: false,
        }
    }
}

impl OtpConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let ttl_secs = env_parse("OTP_TTL_SECS", defaults.ttl_secs)?;
        if ttl_secs <= 0 {
            return Err(AppError::configuration("OTP_TTL_SECS must be positive"));
        }

        Ok(Self {
            ttl_secs,
            max_attempts: env_parse("OTP_MAX_ATTEMPTS", defaults.max_attempts)?,
            expose_code: env_flag("OTP_EXPOSE_CODE"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt: JwtConfig,
    pub otp: OtpConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            jwt: JwtConfig::from_env()?,
            otp: OtpConfig::from_env()?,
        })
    }
}

pub(crate) fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::configuration(format!("{key} must be a valid number"))),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
