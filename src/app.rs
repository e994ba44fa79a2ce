use std::sync::Arc;

use axum::http::Method;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::middleware::enforce_route_rules;
use crate::authz::{DefaultPolicyEvaluator, RouteCatalog, RouteGuard};
use crate::config::{AppConfig, OtpConfig};
use crate::db;
use crate::docs;
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{activity, auth, authz, group_roles, health, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub otp: Arc<OtpConfig>,
    pub event_bus: EventBus,
    pub page_catalog: Arc<RouteCatalog>,
    pub api_catalog: Arc<RouteCatalog>,
    /// Guard over admin screens, answered by the route-access endpoint.
    pub page_guard: RouteGuard,
    /// Guard over `/api/admin`, applied by middleware.
    pub api_guard: RouteGuard,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: AppConfig, event_bus: EventBus) -> Result<Self, AppError> {
        let pages = Arc::new(RouteCatalog::admin_pages()?);
        let api = Arc::new(RouteCatalog::admin_api()?);

        Ok(Self {
            pool,
            jwt: Arc::new(config.jwt),
            otp: Arc::new(config.otp),
            event_bus,
            page_guard: RouteGuard::new(Arc::new(DefaultPolicyEvaluator::new(Arc::clone(&pages)))),
            api_guard: RouteGuard::new(Arc::new(DefaultPolicyEvaluator::new(Arc::clone(&api)))),
            page_catalog: pages,
            api_catalog: api,
        })
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let config = AppConfig::from_env()?;
    create_app_with_config(pool, config).await
}

pub async fn create_app_with_config(pool: SqlitePool, config: AppConfig) -> Result<Router, AppError> {
    db::seed_permissions(&pool).await?;

    let (event_bus, event_rx) = init_event_bus();
    tokio::spawn(start_activity_listener(event_rx, pool.clone()));

    let state = AppState::new(pool, config, event_bus)?;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/send-otp", post(auth::send_otp))
        .route("/verify-otp", post(auth::verify_otp))
        .route("/refresh", post(auth::refresh))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let authz_routes = Router::new()
        .route("/route-access", get(authz::route_access))
        .route("/catalog", get(authz::catalog));

    // Every admin call, including unknown paths, passes the API guard.
    let admin_routes = Router::new()
        .route("/permissions", get(group_roles::list_permissions))
        .route("/group-roles", get(group_roles::list_group_roles).post(group_roles::create_group_role))
        .route(
            "/group-roles/:id",
            get(group_roles::get_group_role)
                .put(group_roles::update_group_role)
                .delete(group_roles::deactivate_group_role),
        )
        .route("/users", get(users::list_users))
        .route(
            "/users/:id/group-roles",
            get(users::get_user_group_roles).put(users::set_user_group_roles),
        )
        .route("/users/:id/effective-permissions", get(users::get_effective_permissions))
        .route("/activity", get(activity::list_activity))
        .fallback(admin_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), enforce_route_rules));

    let router = Router::new()
        .nest("/auth", auth_routes)
        .route("/api/health", get(health::health))
        .nest("/api/authz", authz_routes)
        .nest("/api/admin", admin_routes)
        .with_state(state)
        .merge(docs::swagger_routes(docs::build_openapi(docs::server_port())?)?)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}

async fn admin_not_found() -> AppError {
    AppError::not_found("no such admin endpoint")
}
