use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use crate::app::AppState;
use crate::db::{group_roles, otp, sessions, users};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::{AuthUser, TokenKind, TokenSubject};
use crate::models::auth::{
    LoginResponse, MeResponse, MessageResponse, RefreshRequest, RefreshResponse, SendOtpRequest, SendOtpResponse,
    VerifyOtpRequest,
};
use crate::utils::normalize_mobile;

#[utoipa::path(
    post,
    path = "/auth/send-otp",
    tag = "Auth",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "Code issued", body = SendOtpResponse),
        (status = 400, description = "Invalid mobile number")
    ),
    security(())
)]
pub async fn send_otp(
    State(state): State<AppState>,
    Json(payload): Json<SendOtpRequest>,
) -> AppResult<Json<SendOtpResponse>> {
    let mobile = normalize_mobile(&payload.mobile_number)?;
    let code = otp::issue(&state.pool, &mobile, &state.otp).await?;

    tracing::info!(mobile = %mobile, ttl_secs = state.otp.ttl_secs, "otp issued");

    Ok(Json(SendOtpResponse {
        message: "OTP sent".to_string(),
        expires_in: state.otp.ttl_secs,
        debug_code: state.otp.expose_code.then_some(code),
    }))
}

#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    tag = "Auth",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid or expired code")
    ),
    security(())
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<VerifyOtpRequest>,
) -> AppResult<Json<LoginResponse>> {
    let mobile = normalize_mobile(&payload.mobile_number)?;
    otp::verify(&state.pool, &mobile, &payload.otp, &state.otp).await?;

    let (mut user, created) = users::get_or_create(&state.pool, &mobile).await?;
    let context = RequestContext::from_headers(&headers);

    if let Some(name) = payload.name.as_deref().map(str::trim).filter(|name| !name.is_empty()) {
        if user.name.is_empty() {
            user = users::update_profile(&state.pool, user.id, Some(name), None).await?;
        }
    }

    if created {
        tracing::info!(user_id = %user.id, "new user registered");
        log_activity_with_context(&state.event_bus, "registered", Some(user.id), &user, None, Some(context.clone()));
    }

    let permissions = group_roles::effective_permissions(&state.pool, user.id).await?;
    let session = sessions::open(&state.pool, user.id).await?;

    let subject = TokenSubject {
        user_id: user.id,
        session_id: session.id,
        role: &user.user_role,
        name: &user.name,
        permissions: &permissions,
    };
    let access_token = state.jwt.encode(&subject, TokenKind::Access)?;
    let refresh_token = state.jwt.encode(&subject, TokenKind::Refresh)?;

    log_activity_with_context(&state.event_bus, "login", Some(user.id), &session, None, Some(context));
    tracing::info!(user_id = %user.id, permissions = permissions.len(), "user logged in");

    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
        user_role: user.user_role,
        id: user.id,
        name: user.name,
        permissions: permissions.to_strings(),
    }))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token with current permissions", body = RefreshResponse),
        (status = 401, description = "Refresh token invalid or session closed")
    ),
    security(())
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    let claims = state.jwt.decode(&payload.refresh_token, TokenKind::Refresh)?;
    if !sessions::is_open(&state.pool, claims.sid).await? {
        return Err(AppError::unauthorized("session has been closed"));
    }

    let user = users::fetch(&state.pool, claims.sub).await?;
    let permissions = group_roles::effective_permissions(&state.pool, user.id).await?;

    let subject = TokenSubject {
        user_id: user.id,
        session_id: claims.sid,
        role: &user.user_role,
        name: &user.name,
        permissions: &permissions,
    };
    let access_token = state.jwt.encode(&subject, TokenKind::Access)?;

    Ok(Json(RefreshResponse {
        access_token,
        permissions: permissions.to_strings(),
    }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user", body = MeResponse))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<MeResponse>> {
    let user = users::fetch(&state.pool, auth.user_id).await?;
    let permissions = group_roles::effective_permissions(&state.pool, user.id).await?;

    Ok(Json(MeResponse {
        user,
        session_id: auth.session_id,
        permissions: permissions.to_strings(),
    }))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Session closed", body = MessageResponse))
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    auth: AuthUser,
) -> AppResult<Json<MessageResponse>> {
    if let Some(session) = sessions::close(&state.pool, auth.session_id).await? {
        log_activity_with_context(
            &state.event_bus,
            "logout",
            Some(auth.user_id),
            &session,
            None,
            Some(RequestContext::from_headers(&headers)),
        );
    }

    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}
