//! Storage seam for the RBAC graph.
//!
//! Every decision reads through this trait afresh; nothing here caches.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::rbac::{
    Group, GroupChanges, GroupRole, NewGroup, NewPermission, NewRole, Permission,
    PermissionChanges, Role, RoleChanges, RolePermission, UserAccess,
};
use crate::models::user::{DbUser, NewUser, User, UserStatus};

pub mod sqlite;

pub use sqlite::SqliteRbacRepository;

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub status: Option<UserStatus>,
    pub is_admin: Option<bool>,
}

#[async_trait]
pub trait RbacRepository: Send + Sync {
    // permissions
    async fn create_permission(&self, new: NewPermission) -> AppResult<Permission>;
    async fn get_permission(&self, id: Uuid) -> AppResult<Option<Permission>>;
    async fn find_permission(&self, resource: &str, action: &str) -> AppResult<Option<Permission>>;
    async fn list_permissions(&self) -> AppResult<Vec<Permission>>;
    async fn list_permissions_by_resource(&self, resource: &str) -> AppResult<Vec<Permission>>;
    async fn update_permission(&self, id: Uuid, changes: PermissionChanges) -> AppResult<Permission>;
    /// Deletes the permission and its RolePermission rows. False when absent.
    async fn delete_permission(&self, id: Uuid) -> AppResult<bool>;

    // roles
    async fn create_role(&self, new: NewRole) -> AppResult<Role>;
    async fn get_role(&self, id: Uuid) -> AppResult<Option<Role>>;
    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>>;
    async fn list_roles(&self) -> AppResult<Vec<Role>>;
    async fn update_role(&self, id: Uuid, changes: RoleChanges) -> AppResult<Role>;
    /// Deletes the role with its RolePermission and GroupRole rows.
    async fn delete_role(&self, id: Uuid) -> AppResult<bool>;
    async fn role_permissions(&self, role_id: Uuid) -> AppResult<Vec<Permission>>;

    // groups
    async fn create_group(&self, new: NewGroup) -> AppResult<Group>;
    async fn get_group(&self, id: Uuid) -> AppResult<Option<Group>>;
    async fn find_group_by_name(&self, name: &str) -> AppResult<Option<Group>>;
    async fn list_groups(&self) -> AppResult<Vec<Group>>;
    async fn update_group(&self, id: Uuid, changes: GroupChanges) -> AppResult<Group>;
    /// Deletes the group with its GroupRole rows; members drop to no group.
    async fn delete_group(&self, id: Uuid) -> AppResult<bool>;
    async fn group_roles(&self, group_id: Uuid) -> AppResult<Vec<Role>>;
    async fn group_members(&self, group_id: Uuid) -> AppResult<Vec<User>>;

    // associations
    async fn role_permission_exists(&self, role_id: Uuid, permission_id: Uuid) -> AppResult<bool>;
    async fn add_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> AppResult<RolePermission>;
    async fn remove_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> AppResult<bool>;
    async fn group_role_exists(&self, group_id: Uuid, role_id: Uuid) -> AppResult<bool>;
    async fn add_group_role(&self, group_id: Uuid, role_id: Uuid) -> AppResult<GroupRole>;
    async fn remove_group_role(&self, group_id: Uuid, role_id: Uuid) -> AppResult<bool>;
    async fn count_role_permissions(&self) -> AppResult<i64>;
    async fn count_group_roles(&self) -> AppResult<i64>;

    // users
    async fn create_user(&self, new: NewUser) -> AppResult<User>;
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<DbUser>>;
    async fn list_users(&self) -> AppResult<Vec<User>>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> AppResult<User>;
    async fn delete_user(&self, id: Uuid) -> AppResult<bool>;
    async fn set_user_group(&self, user_id: Uuid, group_id: Option<Uuid>) -> AppResult<User>;
    async fn set_user_status(&self, user_id: Uuid, status: UserStatus) -> AppResult<User>;

    // email verification
    async fn store_verification(&self, user_id: Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> AppResult<()>;
    /// Consumes a verification token, returning its user when still valid.
    async fn consume_verification(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<Option<Uuid>>;

    // decision reads
    /// User plus its group, one hop.
    async fn find_user_with_group(&self, user_id: Uuid) -> AppResult<Option<(User, Option<Group>)>>;
    /// Full User→Group→Role→Permission traversal in one fetch.
    async fn load_access(&self, user_id: Uuid) -> AppResult<Option<UserAccess>>;
}
