use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::events::{Loggable, Severity};

/// A named bundle of permissions assigned to users.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupRole {
    pub id: Uuid,
    #[schema(example = "Front Desk")]
    pub name: String,
    pub is_active: bool,
    #[schema(example = json!(["booking:view", "property:view"]))]
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for GroupRole {
    fn entity_type() -> &'static str { "group_role" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbGroupRole {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbGroupRole {
    pub fn with_permissions(self, permissions: Vec<String>) -> GroupRole {
        GroupRole {
            id: self.id,
            name: self.name,
            is_active: self.is_active,
            permissions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GroupRoleCreateRequest {
    #[schema(example = "Front Desk")]
    pub name: String,
    #[serde(default)]
    #[schema(example = json!(["booking:view"]))]
    pub permissions: Vec<String>,
}

/// Omitted fields are left unchanged; `permissions` replaces the whole list.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GroupRoleUpdateRequest {
    pub name: Option<String>,
    pub permissions: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PermissionInfo {
    #[schema(example = "booking:view")]
    pub name: String,
    pub description: String,
    pub is_active: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserGroupRolesRequest {
    pub group_role_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserGroupRoles {
    pub user_id: Uuid,
    pub group_roles: Vec<GroupRole>,
}

impl Loggable for UserGroupRoles {
    fn entity_type() -> &'static str { "user_group_roles" }
    fn subject_id(&self) -> Uuid { self.user_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EffectivePermissions {
    pub user_id: Uuid,
    pub permissions: Vec<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GroupRoleListQuery {
    /// Include deactivated roles (default false).
    #[serde(default)]
    pub include_inactive: bool,
}
