//! RBAC Admin API Routes
//!
//! Every route here sits behind `authenticate` and carries its own
//! requirement through [`AuthorizationGate::require`].

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{resources, AuthorizationGate, Principal, Requirement, SeedReport};
use crate::errors::AppResult;
use crate::models::rbac::*;
use crate::models::user::{SetGroupRequest, User, UserCreateRequest, UserUpdateRequest};

// =============================================================================
// ROUTER
// =============================================================================

pub fn routes(gate: &AuthorizationGate) -> Router<AppState> {
    let can = |resource: &str, action: Action| gate.require(Requirement::permission(resource, action.as_str()));
    let admin = || gate.require(Requirement::Admin);

    use resources::{GROUPS, PERMISSIONS, ROLES, USERS};
    use Action::{Create, Delete, Read, Update};

    Router::new()
        // Permissions
        .route(
            "/permissions",
            get(list_permissions)
                .route_layer(can(PERMISSIONS, Read))
                .merge(post(create_permission).route_layer(can(PERMISSIONS, Create))),
        )
        .route(
            "/permissions/:id",
            get(get_permission)
                .route_layer(can(PERMISSIONS, Read))
                .merge(put(update_permission).route_layer(can(PERMISSIONS, Update)))
                .merge(axum::routing::delete(delete_permission).route_layer(can(PERMISSIONS, Delete))),
        )
        .route(
            "/permissions/resource/:resource",
            get(list_permissions_by_resource).route_layer(can(PERMISSIONS, Read)),
        )
        .route(
            "/permissions/resource/:resource/:action",
            get(find_permission).route_layer(can(PERMISSIONS, Read)),
        )
        // Roles
        .route(
            "/roles",
            get(list_roles)
                .route_layer(can(ROLES, Read))
                .merge(post(create_role).route_layer(can(ROLES, Create))),
        )
        .route(
            "/roles/:id",
            get(get_role)
                .route_layer(can(ROLES, Read))
                .merge(put(update_role).route_layer(can(ROLES, Update)))
                .merge(axum::routing::delete(delete_role).route_layer(can(ROLES, Delete))),
        )
        .route(
            "/roles/:id/permissions",
            get(list_role_permissions).route_layer(can(ROLES, Read)),
        )
        .route(
            "/roles/:id/permissions/:permission_id",
            post(assign_permission_to_role)
                .merge(axum::routing::delete(remove_permission_from_role))
                .route_layer(can(ROLES, Update)),
        )
        // Groups
        .route(
            "/groups",
            get(list_groups)
                .route_layer(can(GROUPS, Read))
                .merge(post(create_group).route_layer(can(GROUPS, Create))),
        )
        .route(
            "/groups/:id",
            get(get_group)
                .route_layer(can(GROUPS, Read))
                .merge(put(update_group).route_layer(can(GROUPS, Update)))
                .merge(axum::routing::delete(delete_group).route_layer(can(GROUPS, Delete))),
        )
        .route(
            "/groups/:id/roles/:role_id",
            post(assign_role_to_group)
                .merge(axum::routing::delete(remove_role_from_group))
                .route_layer(can(GROUPS, Update)),
        )
        .route(
            "/groups/:id/users/:user_id",
            post(add_user_to_group)
                .merge(axum::routing::delete(remove_user_from_group))
                .route_layer(can(GROUPS, Update)),
        )
        // Users
        .route(
            "/users",
            get(list_users)
                .route_layer(can(USERS, Read))
                .merge(post(create_user).route_layer(can(USERS, Create))),
        )
        .route(
            "/users/:id",
            get(get_user)
                .route_layer(can(USERS, Read))
                .merge(put(update_user).route_layer(can(USERS, Update)))
                .merge(axum::routing::delete(delete_user).route_layer(can(USERS, Delete))),
        )
        .route("/users/:id/group", put(set_user_group).route_layer(can(USERS, Update)))
        .route(
            "/users/:id/permissions",
            get(get_user_permissions).route_layer(can(USERS, Read)),
        )
        .route("/users/:id/admin", get(get_user_admin_status).route_layer(admin()))
        // Provisioning
        .route("/bootstrap", post(run_bootstrap).route_layer(admin()))
}

// =============================================================================
// PERMISSION ENDPOINTS
// =============================================================================

#[utoipa::path(
    get,
    path = "/rbac/permissions",
    tag = "RBAC",
    responses(
        (status = 200, description = "Permission catalog", body = Vec<Permission>),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Requires permissions:read")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_permissions(State(state): State<AppState>) -> AppResult<Json<Vec<Permission>>> {
    Ok(Json(state.permissions.list().await?))
}

#[utoipa::path(
    post,
    path = "/rbac/permissions",
    tag = "RBAC",
    request_body = PermissionCreateRequest,
    responses(
        (status = 201, description = "Permission created", body = Permission),
        (status = 409, description = "Resource and action already defined"),
        (status = 422, description = "Invalid name, resource or action")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_permission(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<PermissionCreateRequest>,
) -> AppResult<(StatusCode, Json<Permission>)> {
    let permission = state.permissions.create(principal.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

#[utoipa::path(
    get,
    path = "/rbac/permissions/{id}",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "Permission id")),
    responses(
        (status = 200, description = "Permission", body = Permission),
        (status = 404, description = "Permission not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_permission(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<Permission>> {
    Ok(Json(state.permissions.get(id).await?))
}

#[utoipa::path(
    get,
    path = "/rbac/permissions/resource/{resource}",
    tag = "RBAC",
    params(("resource" = String, Path, description = "Resource name")),
    responses((status = 200, description = "Permissions on the resource", body = Vec<Permission>)),
    security(("bearerAuth" = []))
)]
pub async fn list_permissions_by_resource(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> AppResult<Json<Vec<Permission>>> {
    Ok(Json(state.permissions.list_by_resource(&resource).await?))
}

#[utoipa::path(
    get,
    path = "/rbac/permissions/resource/{resource}/{action}",
    tag = "RBAC",
    params(
        ("resource" = String, Path, description = "Resource name"),
        ("action" = String, Path, description = "Action verb")
    ),
    responses(
        (status = 200, description = "Permission", body = Permission),
        (status = 404, description = "Permission not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn find_permission(
    State(state): State<AppState>,
    Path((resource, action)): Path<(String, String)>,
) -> AppResult<Json<Permission>> {
    Ok(Json(state.permissions.find(&resource, &action).await?))
}

#[utoipa::path(
    put,
    path = "/rbac/permissions/{id}",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "Permission id")),
    request_body = PermissionUpdateRequest,
    responses(
        (status = 200, description = "Permission updated", body = Permission),
        (status = 404, description = "Permission not found"),
        (status = 409, description = "Resource and action already defined")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_permission(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<PermissionUpdateRequest>,
) -> AppResult<Json<Permission>> {
    Ok(Json(state.permissions.update(principal.actor(), id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/rbac/permissions/{id}",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "Permission id")),
    responses(
        (status = 204, description = "Permission and its role grants deleted"),
        (status = 404, description = "Permission not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_permission(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.permissions.delete(principal.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// ROLE ENDPOINTS
// =============================================================================

#[utoipa::path(
    get,
    path = "/rbac/roles",
    tag = "RBAC",
    responses((status = 200, description = "List of roles", body = Vec<Role>)),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(State(state): State<AppState>) -> AppResult<Json<Vec<Role>>> {
    Ok(Json(state.roles.list().await?))
}

#[utoipa::path(
    post,
    path = "/rbac/roles",
    tag = "RBAC",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 409, description = "Role name taken")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<RoleCreateRequest>,
) -> AppResult<(StatusCode, Json<Role>)> {
    let role = state.roles.create(principal.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    get,
    path = "/rbac/roles/{id}",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role with its permissions", body = RoleDetail),
        (status = 404, description = "Role not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_role(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<RoleDetail>> {
    Ok(Json(state.roles.get(id).await?))
}

#[utoipa::path(
    put,
    path = "/rbac/roles/{id}",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "Role id")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "Role updated", body = Role),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role name taken")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<RoleUpdateRequest>,
) -> AppResult<Json<Role>> {
    Ok(Json(state.roles.update(principal.actor(), id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/rbac/roles/{id}",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "Role id")),
    responses(
        (status = 204, description = "Role and its grants deleted"),
        (status = 404, description = "Role not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.roles.delete(principal.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/rbac/roles/{id}/permissions",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "Role id")),
    responses((status = 200, description = "Permissions granted by the role", body = Vec<Permission>)),
    security(("bearerAuth" = []))
)]
pub async fn list_role_permissions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Permission>>> {
    Ok(Json(state.roles.permissions(id).await?))
}

#[utoipa::path(
    post,
    path = "/rbac/roles/{id}/permissions/{permission_id}",
    tag = "RBAC",
    params(
        ("id" = Uuid, Path, description = "Role id"),
        ("permission_id" = Uuid, Path, description = "Permission id")
    ),
    responses(
        (status = 201, description = "Permission granted to role", body = RolePermission),
        (status = 404, description = "Role or permission not found"),
        (status = 409, description = "Already granted")
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_permission_to_role(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, permission_id)): Path<(Uuid, Uuid)>,
) -> AppResult<(StatusCode, Json<RolePermission>)> {
    let link = state.roles.assign_permission(principal.actor(), id, permission_id).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

#[utoipa::path(
    delete,
    path = "/rbac/roles/{id}/permissions/{permission_id}",
    tag = "RBAC",
    params(
        ("id" = Uuid, Path, description = "Role id"),
        ("permission_id" = Uuid, Path, description = "Permission id")
    ),
    responses(
        (status = 204, description = "Permission revoked from role"),
        (status = 404, description = "Not granted")
    ),
    security(("bearerAuth" = []))
)]
pub async fn remove_permission_from_role(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, permission_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state.roles.remove_permission(principal.actor(), id, permission_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// GROUP ENDPOINTS
// =============================================================================

#[utoipa::path(
    get,
    path = "/rbac/groups",
    tag = "RBAC",
    responses((status = 200, description = "List of groups", body = Vec<Group>)),
    security(("bearerAuth" = []))
)]
pub async fn list_groups(State(state): State<AppState>) -> AppResult<Json<Vec<Group>>> {
    Ok(Json(state.groups.list().await?))
}

#[utoipa::path(
    post,
    path = "/rbac/groups",
    tag = "RBAC",
    request_body = GroupCreateRequest,
    responses(
        (status = 201, description = "Group created", body = Group),
        (status = 409, description = "Group name taken")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_group(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<GroupCreateRequest>,
) -> AppResult<(StatusCode, Json<Group>)> {
    let group = state.groups.create(principal.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

#[utoipa::path(
    get,
    path = "/rbac/groups/{id}",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "Group id")),
    responses(
        (status = 200, description = "Group with roles and members", body = GroupDetail),
        (status = 404, description = "Group not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_group(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<GroupDetail>> {
    Ok(Json(state.groups.get(id).await?))
}

#[utoipa::path(
    put,
    path = "/rbac/groups/{id}",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "Group id")),
    request_body = GroupUpdateRequest,
    responses(
        (status = 200, description = "Group updated", body = Group),
        (status = 404, description = "Group not found"),
        (status = 409, description = "Group name taken")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_group(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<GroupUpdateRequest>,
) -> AppResult<Json<Group>> {
    Ok(Json(state.groups.update(principal.actor(), id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/rbac/groups/{id}",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "Group id")),
    responses(
        (status = 204, description = "Group deleted, members left without a group"),
        (status = 404, description = "Group not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_group(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.groups.delete(principal.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/rbac/groups/{id}/roles/{role_id}",
    tag = "RBAC",
    params(
        ("id" = Uuid, Path, description = "Group id"),
        ("role_id" = Uuid, Path, description = "Role id")
    ),
    responses(
        (status = 201, description = "Role assigned to group", body = GroupRole),
        (status = 404, description = "Group or role not found"),
        (status = 409, description = "Already assigned")
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_role_to_group(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> AppResult<(StatusCode, Json<GroupRole>)> {
    let link = state.groups.assign_role(principal.actor(), id, role_id).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

#[utoipa::path(
    delete,
    path = "/rbac/groups/{id}/roles/{role_id}",
    tag = "RBAC",
    params(
        ("id" = Uuid, Path, description = "Group id"),
        ("role_id" = Uuid, Path, description = "Role id")
    ),
    responses(
        (status = 204, description = "Role removed from group"),
        (status = 404, description = "Not assigned")
    ),
    security(("bearerAuth" = []))
)]
pub async fn remove_role_from_group(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state.groups.remove_role(principal.actor(), id, role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/rbac/groups/{id}/users/{user_id}",
    tag = "RBAC",
    params(
        ("id" = Uuid, Path, description = "Group id"),
        ("user_id" = Uuid, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User moved into group", body = User),
        (status = 404, description = "Group or user not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn add_user_to_group(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<User>> {
    Ok(Json(state.groups.add_user(principal.actor(), id, user_id).await?))
}

#[utoipa::path(
    delete,
    path = "/rbac/groups/{id}/users/{user_id}",
    tag = "RBAC",
    params(
        ("id" = Uuid, Path, description = "Group id"),
        ("user_id" = Uuid, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User left the group", body = User),
        (status = 404, description = "User is not a member")
    ),
    security(("bearerAuth" = []))
)]
pub async fn remove_user_from_group(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<User>> {
    Ok(Json(state.groups.remove_user(principal.actor(), id, user_id).await?))
}

// =============================================================================
// USER ENDPOINTS
// =============================================================================

#[utoipa::path(
    get,
    path = "/rbac/users",
    tag = "RBAC",
    responses((status = 200, description = "List of users", body = Vec<User>)),
    security(("bearerAuth" = []))
)]
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.users.list().await?))
}

#[utoipa::path(
    post,
    path = "/rbac/users",
    tag = "RBAC",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 409, description = "Email already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.users.create(principal.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/rbac/users/{id}",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<User>> {
    Ok(Json(state.users.get(id).await?))
}

#[utoipa::path(
    put,
    path = "/rbac/users/{id}",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 403, description = "Admin status changes need an admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserUpdateRequest>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.update(principal.actor(), id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/rbac/users/{id}",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.users.delete(principal.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/rbac/users/{id}/group",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = SetGroupRequest,
    responses(
        (status = 200, description = "Group membership changed", body = User),
        (status = 404, description = "User or group not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn set_user_group(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetGroupRequest>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.set_group(principal.actor(), id, payload.group_id).await?))
}

#[utoipa::path(
    get,
    path = "/rbac/users/{id}/permissions",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Effective permissions", body = EffectivePermissions),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user_permissions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EffectivePermissions>> {
    state.users.get(id).await?;
    let is_admin = state.checker.is_admin(id).await?;
    let permissions = state.checker.get_user_permissions(id).await?;
    Ok(Json(EffectivePermissions {
        user_id: id,
        is_admin,
        permissions,
    }))
}

#[utoipa::path(
    get,
    path = "/rbac/users/{id}/admin",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Admin status", body = AdminStatus),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user_admin_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AdminStatus>> {
    let is_admin = state.checker.is_admin(id).await?;
    Ok(Json(AdminStatus { user_id: id, is_admin }))
}

// =============================================================================
// PROVISIONING
// =============================================================================

#[utoipa::path(
    post,
    path = "/rbac/bootstrap",
    tag = "RBAC",
    responses(
        (status = 200, description = "Default layout provisioned", body = SeedReport),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearerAuth" = []))
)]
pub async fn run_bootstrap(State(state): State<AppState>, principal: Principal) -> AppResult<Json<SeedReport>> {
    tracing::info!(actor = %principal.user_id, "rbac bootstrap requested");
    Ok(Json(state.manager.bootstrap().await?))
}
