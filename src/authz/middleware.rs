//! Route guard for the admin JSON API.

use axum::extract::{OriginalUri, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::app::AppState;
use crate::errors::AppError;
use crate::jwt::AuthUser;

use super::evaluator::RouteAccess;

/// Authenticate the caller and apply the API route table.
///
/// Missing or closed sessions answer 401, unsatisfied rules 403. On success
/// the `AuthUser` is stored in the request extensions for the handler.
pub async fn enforce_route_rules(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Nested routers see a stripped URI.
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let user = AuthUser::authenticate(&state, request.headers()).await?;

    match state.api_guard.evaluator().evaluate_route(Some(&user.permissions), &path) {
        RouteAccess::Denied { reason } => {
            tracing::warn!(
                user_id = %user.user_id,
                method = %request.method(),
                path = %path,
                reason = ?reason,
                "admin api request denied"
            );
            Err(AppError::from(reason))
        }
        _ => {
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
    }
}
