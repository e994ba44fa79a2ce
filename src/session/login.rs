use std::fmt;

use serde::Deserialize;

use crate::authz::{parse_permissions, GrantedPermissions};

/// Permissions as sent by the backend: either a list or one comma-joined string.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PermissionList {
    List(Vec<String>),
    Joined(String),
}

impl Default for PermissionList {
    fn default() -> Self {
        PermissionList::List(Vec::new())
    }
}

impl PermissionList {
    pub fn to_granted(&self) -> GrantedPermissions {
        match self {
            PermissionList::List(list) => parse_permissions(list).into_iter().collect(),
            PermissionList::Joined(joined) => GrantedPermissions::from_storage(joined),
        }
    }
}

/// User ids arrive as numbers from older backends and as UUID strings from this one.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum LoginId {
    Text(String),
    Number(i64),
}

impl fmt::Display for LoginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginId::Text(text) => f.write_str(text),
            LoginId::Number(number) => write!(f, "{number}"),
        }
    }
}

/// Body of a successful OTP verification, as consumed by a session.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginPayload {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(alias = "role")]
    pub user_role: String,
    pub id: LoginId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub permissions: PermissionList,
}
