use axum::extract::{Query, State};
use axum::Json;

use crate::app::AppState;
use crate::db;
use crate::errors::AppResult;
use crate::models::activity::{ActivityEntry, ActivityQuery};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[utoipa::path(
    get,
    path = "/api/admin/activity",
    tag = "Admin",
    params(ActivityQuery),
    responses(
        (status = 200, description = "Audit trail, newest first", body = Vec<ActivityEntry>),
        (status = 403, description = "Missing permission")
    )
)]
pub async fn list_activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<Vec<ActivityEntry>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let entries = db::activity::list(&state.pool, limit, query.subject_id).await?;
    Ok(Json(entries))
}
