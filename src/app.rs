use std::sync::Arc;

use axum::http::Method;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{authenticate, AuthorizationGate, PermissionChecker, RbacManager};
use crate::docs;
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::notify::{LogNotifier, Notifier};
use crate::ratelimit::{rate_limit, RateLimitConfig, RateLimiter};
use crate::repo::{RbacRepository, SqliteRbacRepository};
use crate::routes::{auth, health, rbac};
use crate::services::{AccountService, GroupService, PermissionService, RoleService, UserService};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub repo: Arc<dyn RbacRepository>,
    pub checker: PermissionChecker,
    pub gate: AuthorizationGate,
    pub manager: RbacManager,
    pub limiter: Arc<RateLimiter>,
    pub accounts: AccountService,
    pub permissions: PermissionService,
    pub roles: RoleService,
    pub groups: GroupService,
    pub users: UserService,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, notifier: Arc<dyn Notifier>, limiter: RateLimiter) -> Self {
        let jwt = Arc::new(jwt);
        let repo: Arc<dyn RbacRepository> = Arc::new(SqliteRbacRepository::new(pool.clone()));
        let checker = PermissionChecker::new(repo.clone());
        let gate = AuthorizationGate::new(checker.clone(), jwt.clone());

        Self {
            pool,
            accounts: AccountService::new(repo.clone(), jwt.clone(), notifier),
            permissions: PermissionService::new(repo.clone()),
            roles: RoleService::new(repo.clone()),
            groups: GroupService::new(repo.clone(), checker.clone()),
            users: UserService::new(repo.clone(), checker.clone()),
            manager: RbacManager::new(repo.clone()),
            limiter: Arc::new(limiter),
            jwt,
            repo,
            checker,
            gate,
        }
    }

    /// Everything from the environment, with the logging notifier.
    pub fn from_env(pool: SqlitePool) -> Result<Self, AppError> {
        let jwt = JwtConfig::from_env()?;
        let limiter = RateLimiter::with_system_clock(RateLimitConfig::from_env()?)?;
        Ok(Self::new(pool, jwt, Arc::new(LogNotifier), limiter))
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let state = AppState::from_env(pool)?;
    Ok(create_app_with(state))
}

pub fn create_app_with(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let public_auth = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify-email", post(auth::verify_email))
        .layer(middleware::from_fn_with_state(state.limiter.clone(), rate_limit));

    let session_auth = Router::new()
        .route("/me", get(auth::me).put(auth::update_me))
        .route("/me/permissions", get(auth::my_permissions))
        .route("/me/is-admin", get(auth::my_admin_status))
        .route("/me/check-permission", post(auth::check_my_permissions))
        .route_layer(middleware::from_fn_with_state(state.gate.clone(), authenticate));

    let rbac_routes =
        rbac::routes(&state.gate).route_layer(middleware::from_fn_with_state(state.gate.clone(), authenticate));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", public_auth.merge(session_auth))
        .nest("/rbac", rbac_routes)
        .with_state(state);

    let router = match docs::build_openapi(port_from_env()).and_then(|doc| docs::openapi_routes::<()>(&doc)) {
        Ok(openapi) => router.merge(openapi),
        Err(err) => {
            tracing::warn!(error = %err, "OpenAPI document unavailable");
            router
        }
    };

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// `APP_PORT`, defaulting to 8000.
pub fn port_from_env() -> u16 {
    std::env::var("APP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8000)
}
