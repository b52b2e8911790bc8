use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::row_parsers::{
    access_row_from_row, db_user_from_row, group_from_row, parse_datetime, parse_uuid,
    permission_from_row, role_from_row,
};
use crate::errors::{conflict_on_unique, AppError, AppResult};
use crate::models::rbac::{
    Group, GroupAccess, GroupChanges, GroupRole, NewGroup, NewPermission, NewRole, Permission,
    PermissionChanges, Role, RoleAccess, RoleChanges, RolePermission, UserAccess,
};
use crate::models::user::{DbUser, NewUser, User, UserStatus};
use crate::repo::{RbacRepository, UserChanges};
use crate::utils::utc_now;

const PERMISSION_COLUMNS: &str = "id, name, resource, action, description, created_at, updated_at";
const ROLE_COLUMNS: &str = "id, name, description, created_at, updated_at";
const GROUP_COLUMNS: &str = "id, name, description, is_admin, created_at, updated_at";
const USER_COLUMNS: &str =
    "id, email, password_hash, name, status, is_admin, group_id, created_at, updated_at";

const ACCESS_QUERY: &str = r#"
    SELECT u.id AS user_id, u.is_admin AS user_is_admin,
           g.id AS group_id, g.name AS group_name, g.is_admin AS group_is_admin,
           r.id AS role_id, r.name AS role_name,
           p.id AS permission_id, p.name AS permission_name,
           p.resource AS permission_resource, p.action AS permission_action,
           p.description AS permission_description,
           p.created_at AS permission_created_at, p.updated_at AS permission_updated_at
    FROM users u
    LEFT JOIN access_groups g ON g.id = u.group_id
    LEFT JOIN group_roles gr ON gr.group_id = g.id
    LEFT JOIN roles r ON r.id = gr.role_id
    LEFT JOIN role_permissions rp ON rp.role_id = r.id
    LEFT JOIN permissions p ON p.id = rp.permission_id
    WHERE u.id = ?
    ORDER BY r.name, r.id, p.resource, p.action
"#;

/// `RbacRepository` over a SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteRbacRepository {
    pool: SqlitePool,
}

impl SqliteRbacRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn db_user(&self, id: Uuid) -> AppResult<Option<DbUser>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(db_user_from_row).transpose()
    }
}

#[async_trait]
impl RbacRepository for SqliteRbacRepository {
    // =========================================================================
    // PERMISSIONS
    // =========================================================================

    async fn create_permission(&self, new: NewPermission) -> AppResult<Permission> {
        let now = utc_now();
        let permission = Permission {
            id: Uuid::new_v4(),
            name: new.name,
            resource: new.resource,
            action: new.action,
            description: new.description,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO permissions (id, name, resource, action, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(permission.id.to_string())
        .bind(&permission.name)
        .bind(&permission.resource)
        .bind(permission.action.as_str())
        .bind(&permission.description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "permission with this resource and action already exists"))?;

        Ok(permission)
    }

    async fn get_permission(&self, id: Uuid) -> AppResult<Option<Permission>> {
        let sql = format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(permission_from_row).transpose()
    }

    async fn find_permission(&self, resource: &str, action: &str) -> AppResult<Option<Permission>> {
        let sql = format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE resource = ? AND action = ?");
        let row = sqlx::query(&sql)
            .bind(resource)
            .bind(action)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(permission_from_row).transpose()
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        let sql = format!("SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY resource, action");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(permission_from_row).collect()
    }

    async fn list_permissions_by_resource(&self, resource: &str) -> AppResult<Vec<Permission>> {
        let sql = format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE resource = ? ORDER BY action");
        let rows = sqlx::query(&sql).bind(resource).fetch_all(&self.pool).await?;
        rows.iter().map(permission_from_row).collect()
    }

    async fn update_permission(&self, id: Uuid, changes: PermissionChanges) -> AppResult<Permission> {
        let mut permission = self
            .get_permission(id)
            .await?
            .ok_or_else(|| AppError::not_found("permission not found"))?;

        if let Some(name) = changes.name {
            permission.name = name;
        }
        if let Some(resource) = changes.resource {
            permission.resource = resource;
        }
        if let Some(action) = changes.action {
            permission.action = action;
        }
        if let Some(description) = changes.description {
            permission.description = Some(description);
        }
        permission.updated_at = utc_now();

        sqlx::query(
            "UPDATE permissions SET name = ?, resource = ?, action = ?, description = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&permission.name)
        .bind(&permission.resource)
        .bind(permission.action.as_str())
        .bind(&permission.description)
        .bind(permission.updated_at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "permission with this resource and action already exists"))?;

        Ok(permission)
    }

    async fn delete_permission(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_permissions WHERE permission_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM permissions WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // ROLES
    // =========================================================================

    async fn create_role(&self, new: NewRole) -> AppResult<Role> {
        let now = utc_now();
        let role = Role {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            created_at: now,
            updated_at: now,
        };

        sqlx::query("INSERT INTO roles (id, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
            .bind(role.id.to_string())
            .bind(&role.name)
            .bind(&role.description)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "role name already exists"))?;

        Ok(role)
    }

    async fn get_role(&self, id: Uuid) -> AppResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(role_from_row).transpose()
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = ?");
        let row = sqlx::query(&sql).bind(name).fetch_optional(&self.pool).await?;
        row.as_ref().map(role_from_row).transpose()
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY name");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(role_from_row).collect()
    }

    async fn update_role(&self, id: Uuid, changes: RoleChanges) -> AppResult<Role> {
        let mut role = self
            .get_role(id)
            .await?
            .ok_or_else(|| AppError::not_found("role not found"))?;

        if let Some(name) = changes.name {
            role.name = name;
        }
        if let Some(description) = changes.description {
            role.description = Some(description);
        }
        role.updated_at = utc_now();

        sqlx::query("UPDATE roles SET name = ?, description = ?, updated_at = ? WHERE id = ?")
            .bind(&role.name)
            .bind(&role.description)
            .bind(role.updated_at)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "role name already exists"))?;

        Ok(role)
    }

    async fn delete_role(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM group_roles WHERE role_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn role_permissions(&self, role_id: Uuid) -> AppResult<Vec<Permission>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.name, p.resource, p.action, p.description, p.created_at, p.updated_at
            FROM permissions p
            INNER JOIN role_permissions rp ON p.id = rp.permission_id
            WHERE rp.role_id = ?
            ORDER BY p.resource, p.action
            "#,
        )
        .bind(role_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(permission_from_row).collect()
    }

    // =========================================================================
    // GROUPS
    // =========================================================================

    async fn create_group(&self, new: NewGroup) -> AppResult<Group> {
        let now = utc_now();
        let group = Group {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            is_admin: new.is_admin,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO access_groups (id, name, description, is_admin, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(group.id.to_string())
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.is_admin)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "group name already exists"))?;

        Ok(group)
    }

    async fn get_group(&self, id: Uuid) -> AppResult<Option<Group>> {
        let sql = format!("SELECT {GROUP_COLUMNS} FROM access_groups WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(group_from_row).transpose()
    }

    async fn find_group_by_name(&self, name: &str) -> AppResult<Option<Group>> {
        let sql = format!("SELECT {GROUP_COLUMNS} FROM access_groups WHERE name = ?");
        let row = sqlx::query(&sql).bind(name).fetch_optional(&self.pool).await?;
        row.as_ref().map(group_from_row).transpose()
    }

    async fn list_groups(&self) -> AppResult<Vec<Group>> {
        let sql = format!("SELECT {GROUP_COLUMNS} FROM access_groups ORDER BY name");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(group_from_row).collect()
    }

    async fn update_group(&self, id: Uuid, changes: GroupChanges) -> AppResult<Group> {
        let mut group = self
            .get_group(id)
            .await?
            .ok_or_else(|| AppError::not_found("group not found"))?;

        if let Some(name) = changes.name {
            group.name = name;
        }
        if let Some(description) = changes.description {
            group.description = Some(description);
        }
        if let Some(is_admin) = changes.is_admin {
            group.is_admin = is_admin;
        }
        group.updated_at = utc_now();

        sqlx::query(
            "UPDATE access_groups SET name = ?, description = ?, is_admin = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.is_admin)
        .bind(group.updated_at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "group name already exists"))?;

        Ok(group)
    }

    async fn delete_group(&self, id: Uuid) -> AppResult<bool> {
        let now = utc_now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE users SET group_id = NULL, updated_at = ? WHERE group_id = ?")
            .bind(now)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM group_roles WHERE group_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM access_groups WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn group_roles(&self, group_id: Uuid) -> AppResult<Vec<Role>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name, r.description, r.created_at, r.updated_at
            FROM roles r
            INNER JOIN group_roles gr ON r.id = gr.role_id
            WHERE gr.group_id = ?
            ORDER BY r.name
            "#,
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(role_from_row).collect()
    }

    async fn group_members(&self, group_id: Uuid) -> AppResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE group_id = ? ORDER BY email");
        let rows = sqlx::query(&sql)
            .bind(group_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| db_user_from_row(row).map(User::from))
            .collect()
    }

    // =========================================================================
    // ASSOCIATIONS
    // =========================================================================

    async fn role_permission_exists(&self, role_id: Uuid, permission_id: Uuid) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM role_permissions WHERE role_id = ? AND permission_id = ?",
        )
        .bind(role_id.to_string())
        .bind(permission_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn add_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> AppResult<RolePermission> {
        let now = utc_now();
        sqlx::query("INSERT INTO role_permissions (role_id, permission_id, created_at) VALUES (?, ?, ?)")
            .bind(role_id.to_string())
            .bind(permission_id.to_string())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "permission already assigned to this role"))?;

        Ok(RolePermission {
            role_id,
            permission_id,
            created_at: now,
        })
    }

    async fn remove_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM role_permissions WHERE role_id = ? AND permission_id = ?")
            .bind(role_id.to_string())
            .bind(permission_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn group_role_exists(&self, group_id: Uuid, role_id: Uuid) -> AppResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM group_roles WHERE group_id = ? AND role_id = ?")
                .bind(group_id.to_string())
                .bind(role_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    async fn add_group_role(&self, group_id: Uuid, role_id: Uuid) -> AppResult<GroupRole> {
        let now = utc_now();
        sqlx::query("INSERT INTO group_roles (group_id, role_id, created_at) VALUES (?, ?, ?)")
            .bind(group_id.to_string())
            .bind(role_id.to_string())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "role already assigned to this group"))?;

        Ok(GroupRole {
            group_id,
            role_id,
            created_at: now,
        })
    }

    async fn remove_group_role(&self, group_id: Uuid, role_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM group_roles WHERE group_id = ? AND role_id = ?")
            .bind(group_id.to_string())
            .bind(role_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_role_permissions(&self) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(1) FROM role_permissions")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn count_group_roles(&self) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(1) FROM group_roles")
            .fetch_one(&self.pool)
            .await?)
    }

    // =========================================================================
    // USERS
    // =========================================================================

    async fn create_user(&self, new: NewUser) -> AppResult<User> {
        let now = utc_now();
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, name, status, is_admin, group_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.name)
        .bind(new.status.as_str())
        .bind(new.is_admin)
        .bind(new.group_id.map(|g| g.to_string()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email already in use"))?;

        Ok(User {
            id,
            email: new.email,
            name: new.name,
            status: new.status,
            is_admin: new.is_admin,
            group_id: new.group_id,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.db_user(id).await?.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<DbUser>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let row = sqlx::query(&sql).bind(email).fetch_optional(&self.pool).await?;
        row.as_ref().map(db_user_from_row).transpose()
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY email");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| db_user_from_row(row).map(User::from))
            .collect()
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> AppResult<User> {
        let mut user = self
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?;

        if let Some(name) = changes.name {
            user.name = Some(name);
        }
        if let Some(status) = changes.status {
            user.status = status;
        }
        if let Some(is_admin) = changes.is_admin {
            user.is_admin = is_admin;
        }
        user.updated_at = utc_now();

        sqlx::query("UPDATE users SET name = ?, status = ?, is_admin = ?, updated_at = ? WHERE id = ?")
            .bind(&user.name)
            .bind(user.status.as_str())
            .bind(user.is_admin)
            .bind(user.updated_at)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM email_verifications WHERE user_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_user_group(&self, user_id: Uuid, group_id: Option<Uuid>) -> AppResult<User> {
        let result = sqlx::query("UPDATE users SET group_id = ?, updated_at = ? WHERE id = ?")
            .bind(group_id.map(|g| g.to_string()))
            .bind(utc_now())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("user not found"));
        }

        self.get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    async fn set_user_status(&self, user_id: Uuid, status: UserStatus) -> AppResult<User> {
        let result = sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(utc_now())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("user not found"));
        }

        self.get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    // =========================================================================
    // EMAIL VERIFICATION
    // =========================================================================

    async fn store_verification(&self, user_id: Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO email_verifications (token_hash, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token_hash)
        .bind(user_id.to_string())
        .bind(expires_at)
        .bind(utc_now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_verification(&self, token_hash: &str, now: DateTime<Utc>) -> AppResult<Option<Uuid>> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT user_id, expires_at FROM email_verifications WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM email_verifications WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if parse_datetime(&expires_at)? < now {
            return Ok(None);
        }
        Ok(Some(parse_uuid(&user_id)?))
    }

    // =========================================================================
    // DECISION READS
    // =========================================================================

    async fn find_user_with_group(&self, user_id: Uuid) -> AppResult<Option<(User, Option<Group>)>> {
        let Some(user) = self.get_user(user_id).await? else {
            return Ok(None);
        };

        let group = match user.group_id {
            Some(group_id) => self.get_group(group_id).await?,
            None => None,
        };

        Ok(Some((user, group)))
    }

    async fn load_access(&self, user_id: Uuid) -> AppResult<Option<UserAccess>> {
        let rows = sqlx::query(ACCESS_QUERY)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let mut access: Option<UserAccess> = None;

        for row in &rows {
            let row = access_row_from_row(row)?;
            let access = access.get_or_insert_with(|| UserAccess {
                user_id: row.user_id,
                is_admin: row.user_is_admin,
                group: None,
            });

            let Some((group_id, group_name, group_is_admin)) = row.group else {
                continue;
            };
            let group = access.group.get_or_insert_with(|| GroupAccess {
                id: group_id,
                name: group_name,
                is_admin: group_is_admin,
                roles: Vec::new(),
            });

            let Some((role_id, role_name)) = row.role else {
                continue;
            };
            // rows arrive ordered by role, so a new role id starts a new entry
            if group.roles.last().map(|r| r.id) != Some(role_id) {
                group.roles.push(RoleAccess {
                    id: role_id,
                    name: role_name,
                    permissions: Vec::new(),
                });
            }

            if let (Some(permission), Some(role)) = (row.permission, group.roles.last_mut()) {
                role.permissions.push(permission);
            }
        }

        Ok(access)
    }
}
