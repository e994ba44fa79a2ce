use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::errors::AppError;

const OTP_DIGITS: u32 = 6;

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Six-digit numeric code, zero padded.
pub fn generate_otp() -> String {
    let modulus = 10u32.pow(OTP_DIGITS);
    let code = OsRng.next_u32() % modulus;
    format!("{code:0width$}", width = OTP_DIGITS as usize)
}

pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Strip separators and validate a mobile number. A leading `+` is kept.
pub fn normalize_mobile(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    let (plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", trimmed),
    };

    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '(' | ')' => {}
            _ => return Err(AppError::bad_request("mobile number may only contain digits")),
        }
    }

    if !(10..=15).contains(&digits.len()) {
        return Err(AppError::bad_request("mobile number must have 10 to 15 digits"));
    }

    Ok(format!("{plus}{digits}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_is_six_digits() {
        for _ in 0..50 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_mobile_normalization() {
        assert_eq!(normalize_mobile(" +91 98765-43210 ").unwrap(), "+919876543210");
        assert_eq!(normalize_mobile("9876543210").unwrap(), "9876543210");
        assert!(normalize_mobile("12345").is_err());
        assert!(normalize_mobile("98765x3210").is_err());
    }

    #[test]
    fn test_sha256_hex_is_stable() {
        assert_eq!(
            sha256_hex("123456"),
            "8d969eef6ecad3c29a3a629280e686cf0c3f5d5a86aff3ca12020c923adc6c92"
        );
    }
}
