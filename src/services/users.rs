use std::sync::Arc;

use uuid::Uuid;

use super::require_admin;
use crate::authz::{Actor, PermissionChecker};
use crate::errors::{AppError, AppResult};
use crate::models::user::{normalize_email, NewUser, User, UserCreateRequest, UserStatus, UserUpdateRequest};
use crate::repo::{RbacRepository, UserChanges};
use crate::utils::hash_password;

const USER_NAME_MAX: usize = 100;

/// Trimmed display name; blank means none.
pub(crate) fn clean_name(name: Option<String>) -> AppResult<Option<String>> {
    let Some(name) = name else {
        return Ok(None);
    };
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    if name.chars().count() > USER_NAME_MAX {
        return Err(AppError::invalid(format!(
            "name must be at most {USER_NAME_MAX} characters"
        )));
    }
    Ok(Some(name.to_string()))
}

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn RbacRepository>,
    checker: PermissionChecker,
}

impl UserService {
    pub fn new(repo: Arc<dyn RbacRepository>, checker: PermissionChecker) -> Self {
        Self { repo, checker }
    }

    /// Admin accounts, by flag or by group, are only managed by admins.
    async fn guard_target(&self, actor: Actor, id: Uuid) -> AppResult<()> {
        if self.checker.is_admin(id).await? {
            require_admin(&self.checker, actor, "manage administrator accounts").await?;
        }
        Ok(())
    }

    async fn guard_group(&self, actor: Actor, group_id: Uuid) -> AppResult<()> {
        let group = self
            .repo
            .get_group(group_id)
            .await?
            .ok_or_else(|| AppError::not_found("group not found"))?;
        if group.is_admin {
            require_admin(&self.checker, actor, "place users in an admin group").await?;
        }
        Ok(())
    }

    /// Administrative creation. Accounts made here skip email verification
    /// unless a status is given.
    pub async fn create(&self, actor: Actor, req: UserCreateRequest) -> AppResult<User> {
        let email = normalize_email(&req.email)?;
        let name = clean_name(req.name)?;
        if self.repo.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("email already in use"));
        }
        if req.is_admin {
            require_admin(&self.checker, actor, "grant admin status").await?;
        }
        if let Some(group_id) = req.group_id {
            self.guard_group(actor, group_id).await?;
        }

        let user = self
            .repo
            .create_user(NewUser {
                email,
                password_hash: hash_password(&req.password)?,
                name,
                status: req.status.unwrap_or(UserStatus::Active),
                is_admin: req.is_admin,
                group_id: req.group_id,
            })
            .await?;

        tracing::info!(actor = %actor, user_id = %user.id, is_admin = user.is_admin, "user created");
        Ok(user)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<User> {
        self.repo
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        self.repo.list_users().await
    }

    pub async fn update(&self, actor: Actor, id: Uuid, req: UserUpdateRequest) -> AppResult<User> {
        self.get(id).await?;
        if req.is_admin.is_some() {
            require_admin(&self.checker, actor, "change admin status").await?;
        }
        self.guard_target(actor, id).await?;

        let changes = UserChanges {
            name: clean_name(req.name)?,
            status: req.status,
            is_admin: req.is_admin,
        };

        let user = self.repo.update_user(id, changes).await?;
        tracing::info!(
            actor = %actor,
            user_id = %id,
            status = %user.status,
            is_admin = user.is_admin,
            "user updated"
        );
        Ok(user)
    }

    pub async fn delete(&self, actor: Actor, id: Uuid) -> AppResult<()> {
        self.guard_target(actor, id).await?;
        if !self.repo.delete_user(id).await? {
            return Err(AppError::not_found("user not found"));
        }
        tracing::info!(actor = %actor, user_id = %id, "user deleted");
        Ok(())
    }

    /// `None` leaves the current group.
    pub async fn set_group(&self, actor: Actor, id: Uuid, group_id: Option<Uuid>) -> AppResult<User> {
        self.get(id).await?;
        self.guard_target(actor, id).await?;
        if let Some(group_id) = group_id {
            self.guard_group(actor, group_id).await?;
        }

        let user = self.repo.set_user_group(id, group_id).await?;
        tracing::info!(actor = %actor, user_id = %id, group_id = ?group_id, "user group changed");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_blank_means_none() {
        assert_eq!(clean_name(Some("  Ada ".into())).unwrap().as_deref(), Some("Ada"));
        assert_eq!(clean_name(Some("   ".into())).unwrap(), None);
        assert_eq!(clean_name(None).unwrap(), None);
        assert!(clean_name(Some("x".repeat(101))).is_err());
    }
}
