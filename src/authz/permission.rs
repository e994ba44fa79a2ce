use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Errors raised while parsing a single permission token.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("permission token is empty")]
    Empty,
    #[error("permission token `{0}` contains invalid characters")]
    InvalidCharacters(String),
}

/// A capability token such as `booking:view`, kept in canonical lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission(String);

impl Permission {
    pub fn parse(raw: &str) -> Result<Self, PermissionError> {
        let token = raw.trim().to_lowercase();
        if token.is_empty() {
            return Err(PermissionError::Empty);
        }

        let valid = token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '_' | '.'));
        if !valid {
            return Err(PermissionError::InvalidCharacters(raw.to_string()));
        }

        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Permission {
    type Error = PermissionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Permission::parse(&value)
    }
}

impl TryFrom<&str> for Permission {
    type Error = PermissionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Permission::parse(value)
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.0
    }
}

/// Parse a list of tokens, silently dropping the malformed ones after logging them.
pub fn parse_permissions<I, S>(tokens: I) -> Vec<Permission>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .filter_map(|raw| match Permission::parse(raw.as_ref()) {
            Ok(permission) => Some(permission),
            Err(PermissionError::Empty) => None,
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed permission token");
                None
            }
        })
        .collect()
}

/// The permissions held by one authenticated session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantedPermissions {
    tokens: HashSet<Permission>,
}

impl GrantedPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared empty set, used for anonymous sessions.
    pub fn empty() -> &'static GrantedPermissions {
        static EMPTY: OnceLock<GrantedPermissions> = OnceLock::new();
        EMPTY.get_or_init(GrantedPermissions::new)
    }

    /// Parse the persisted form: a comma-joined string, or a JSON array of strings.
    ///
    /// Corrupt data yields an empty set; the caller never sees an error.
    pub fn from_storage(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::new();
        }

        if trimmed.starts_with('[') {
            return match serde_json::from_str::<Vec<String>>(trimmed) {
                Ok(list) => parse_permissions(list).into_iter().collect(),
                Err(err) => {
                    tracing::warn!(error = %err, "stored permissions are not a valid JSON array");
                    Self::new()
                }
            };
        }

        let granted: GrantedPermissions = parse_permissions(trimmed.split(',')).into_iter().collect();
        if granted.is_empty() {
            tracing::warn!(raw = %trimmed, "stored permissions contained no usable tokens");
        }
        granted
    }

    /// Comma-joined, sorted so the stored form is stable.
    pub fn to_storage(&self) -> String {
        self.sorted()
            .iter()
            .map(Permission::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn contains(&self, permission: &Permission) -> bool {
        self.tokens.contains(permission)
    }

    pub fn contains_str(&self, raw: &str) -> bool {
        Permission::parse(raw)
            .map(|permission| self.contains(&permission))
            .unwrap_or(false)
    }

    pub fn insert(&mut self, permission: Permission) -> bool {
        self.tokens.insert(permission)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.tokens.iter()
    }

    pub fn sorted(&self) -> Vec<Permission> {
        let mut list: Vec<Permission> = self.tokens.iter().cloned().collect();
        list.sort();
        list
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.sorted().into_iter().map(String::from).collect()
    }
}

impl FromIterator<Permission> for GrantedPermissions {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self {
            tokens: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_lowercased_and_trimmed() {
        let permission = Permission::parse("  Property:View ").unwrap();
        assert_eq!(permission.as_str(), "property:view");
    }

    #[test]
    fn test_rejects_empty_and_garbage_tokens() {
        assert_eq!(Permission::parse("   "), Err(PermissionError::Empty));
        assert!(matches!(
            Permission::parse("booking view"),
            Err(PermissionError::InvalidCharacters(_))
        ));
    }

    #[test]
    fn test_storage_round_trip_ignores_order() {
        let granted = GrantedPermissions::from_storage("a,b,c");
        let reparsed = GrantedPermissions::from_storage(&granted.to_storage());
        let shuffled = GrantedPermissions::from_storage("c,a,b");

        assert_eq!(granted.len(), 3);
        assert_eq!(granted, reparsed);
        assert_eq!(granted, shuffled);
        assert_eq!(granted.to_storage(), "a,b,c");
    }

    #[test]
    fn test_storage_accepts_json_arrays() {
        let granted = GrantedPermissions::from_storage(r#"["booking:view","Blog:Edit"]"#);
        assert!(granted.contains_str("booking:view"));
        assert!(granted.contains_str("blog:edit"));
    }

    #[test]
    fn test_corrupt_storage_is_empty() {
        assert!(GrantedPermissions::from_storage("").is_empty());
        assert!(GrantedPermissions::from_storage(",, ,").is_empty());
        assert!(GrantedPermissions::from_storage("[not json").is_empty());
    }

    #[test]
    fn test_malformed_tokens_are_dropped_individually() {
        let granted = GrantedPermissions::from_storage("booking:view,bad token,blog:view");
        assert_eq!(granted.len(), 2);
        assert!(!granted.contains_str("bad token"));
    }
}
