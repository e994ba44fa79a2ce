use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivityEntry {
    pub id: Uuid,
    #[schema(example = "group_role.created")]
    pub event_name: String,
    pub description: String,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    #[schema(example = "critical")]
    pub severity: String,
    #[schema(value_type = Object)]
    pub properties: Value,
    pub hash: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbActivityEntry {
    pub id: Uuid,
    pub event_name: String,
    pub description: String,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    pub severity: String,
    pub properties: String,
    pub hash: String,
}

impl From<DbActivityEntry> for ActivityEntry {
    fn from(db: DbActivityEntry) -> Self {
        let properties = serde_json::from_str(&db.properties).unwrap_or(Value::Null);
        ActivityEntry {
            id: db.id,
            event_name: db.event_name,
            description: db.description,
            actor_id: db.actor_id,
            subject_id: db.subject_id,
            occurred_at: db.occurred_at,
            severity: db.severity,
            properties,
            hash: db.hash,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityQuery {
    /// Maximum rows, newest first (default 50, max 500).
    pub limit: Option<i64>,
    pub subject_id: Option<Uuid>,
}
