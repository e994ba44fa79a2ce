use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::errors::AppResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_ok: bool,
    pub db_error: Option<String>,
    /// Permissions stored in the vocabulary table.
    pub permissions: i64,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Health check", body = HealthResponse)),
    security(())
)]
pub async fn health(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let db_check = sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM permissions")
        .fetch_one(&state.pool)
        .await;

    let response = match db_check {
        Ok(permissions) => HealthResponse { status: "ok", db_ok: true, db_error: None, permissions },
        Err(e) => HealthResponse { status: "degraded", db_ok: false, db_error: Some(e.to_string()), permissions: 0 },
    };
    Ok(Json(response))
}
