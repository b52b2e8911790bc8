use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::{AppError, AppResult};
use crate::models::rbac::{AdminStatus, EffectivePermissions, PermissionCheckRequest, PermissionCheckResponse};
use crate::models::user::{
    AuthResponse, LoginRequest, ProfileUpdateRequest, RegisterRequest, RegisterResponse, User,
    VerifyEmailRequest,
};

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered, verification pending", body = RegisterResponse),
        (status = 409, description = "Email already in use"),
        (status = 422, description = "Invalid email or weak password"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let response = state.accounts.register(payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    post,
    path = "/auth/verify-email",
    tag = "Auth",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Account activated", body = User),
        (status = 422, description = "Token invalid or expired")
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> AppResult<Json<User>> {
    Ok(Json(state.accounts.verify_email(payload).await?))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account not yet verified")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    Ok(Json(state.accounts.login(payload).await?))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, principal: Principal) -> AppResult<Json<User>> {
    let user = state
        .repo
        .get_user(principal.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    Ok(Json(user))
}

#[utoipa::path(
    put,
    path = "/auth/me",
    tag = "Auth",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Updated profile", body = User),
        (status = 401, description = "Missing or invalid token"),
        (status = 422, description = "Name too long")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_me(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<ProfileUpdateRequest>,
) -> AppResult<Json<User>> {
    Ok(Json(state.accounts.update_profile(principal.user_id, payload).await?))
}

#[utoipa::path(
    get,
    path = "/auth/me/permissions",
    tag = "Auth",
    responses(
        (status = 200, description = "Effective permissions of the caller", body = EffectivePermissions),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn my_permissions(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<EffectivePermissions>> {
    let is_admin = state.checker.is_admin(principal.user_id).await?;
    let permissions = state.checker.get_user_permissions(principal.user_id).await?;
    Ok(Json(EffectivePermissions {
        user_id: principal.user_id,
        is_admin,
        permissions,
    }))
}

#[utoipa::path(
    get,
    path = "/auth/me/is-admin",
    tag = "Auth",
    responses(
        (status = 200, description = "Admin status of the caller", body = AdminStatus),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn my_admin_status(State(state): State<AppState>, principal: Principal) -> AppResult<Json<AdminStatus>> {
    let is_admin = state.checker.is_admin(principal.user_id).await?;
    Ok(Json(AdminStatus {
        user_id: principal.user_id,
        is_admin,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/me/check-permission",
    tag = "Auth",
    request_body = PermissionCheckRequest,
    responses(
        (status = 200, description = "Whether the caller holds the permissions", body = PermissionCheckResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn check_my_permissions(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<PermissionCheckRequest>,
) -> AppResult<Json<PermissionCheckResponse>> {
    let has_permission = state
        .checker
        .check_multiple_permissions(principal.user_id, &payload.permissions, payload.require_all)
        .await?;
    Ok(Json(PermissionCheckResponse { has_permission }))
}
