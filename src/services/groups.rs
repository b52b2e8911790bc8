use std::sync::Arc;

use uuid::Uuid;

use super::require_admin;
use crate::authz::{Actor, PermissionChecker};
use crate::errors::{AppError, AppResult};
use crate::models::rbac::{Group, GroupCreateRequest, GroupDetail, GroupRole, GroupUpdateRequest};
use crate::models::user::User;
use crate::repo::RbacRepository;

#[derive(Clone)]
pub struct GroupService {
    repo: Arc<dyn RbacRepository>,
    checker: PermissionChecker,
}

impl GroupService {
    pub fn new(repo: Arc<dyn RbacRepository>, checker: PermissionChecker) -> Self {
        Self { repo, checker }
    }

    pub async fn create(&self, actor: Actor, req: GroupCreateRequest) -> AppResult<Group> {
        let new = req.validate()?;
        if new.is_admin {
            require_admin(&self.checker, actor, "create admin groups").await?;
        }
        if self.repo.find_group_by_name(&new.name).await?.is_some() {
            return Err(AppError::conflict(format!("group '{}' already exists", new.name)));
        }

        let group = self.repo.create_group(new).await?;
        tracing::info!(
            actor = %actor,
            group_id = %group.id,
            group = %group.name,
            is_admin = group.is_admin,
            "group created"
        );
        Ok(group)
    }

    async fn group(&self, id: Uuid) -> AppResult<Group> {
        self.repo
            .get_group(id)
            .await?
            .ok_or_else(|| AppError::not_found("group not found"))
    }

    async fn user(&self, id: Uuid) -> AppResult<User> {
        self.repo
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<GroupDetail> {
        let group = self.group(id).await?;
        let roles = self.repo.group_roles(id).await?;
        let members = self.repo.group_members(id).await?;
        Ok(GroupDetail { group, roles, members })
    }

    pub async fn list(&self) -> AppResult<Vec<Group>> {
        self.repo.list_groups().await
    }

    pub async fn update(&self, actor: Actor, id: Uuid, req: GroupUpdateRequest) -> AppResult<Group> {
        let changes = req.validate()?;
        let group = self.group(id).await?;
        if group.is_admin || changes.is_admin.is_some() {
            require_admin(&self.checker, actor, "change admin groups").await?;
        }

        if let Some(name) = &changes.name {
            if let Some(other) = self.repo.find_group_by_name(name).await? {
                if other.id != id {
                    return Err(AppError::conflict(format!("group '{name}' already exists")));
                }
            }
        }

        let group = self.repo.update_group(id, changes).await?;
        tracing::info!(actor = %actor, group_id = %id, is_admin = group.is_admin, "group updated");
        Ok(group)
    }

    /// Members are moved to no group; the users themselves stay.
    pub async fn delete(&self, actor: Actor, id: Uuid) -> AppResult<()> {
        let group = self.group(id).await?;
        if group.is_admin {
            require_admin(&self.checker, actor, "delete admin groups").await?;
        }
        if !self.repo.delete_group(id).await? {
            return Err(AppError::not_found("group not found"));
        }
        tracing::info!(actor = %actor, group_id = %id, "group deleted");
        Ok(())
    }

    /// Moves the user into this group, leaving any previous one.
    pub async fn add_user(&self, actor: Actor, group_id: Uuid, user_id: Uuid) -> AppResult<User> {
        let group = self.group(group_id).await?;
        self.user(user_id).await?;
        if group.is_admin || self.checker.is_admin(user_id).await? {
            require_admin(&self.checker, actor, "change administrator membership").await?;
        }

        let user = self.repo.set_user_group(user_id, Some(group_id)).await?;
        tracing::info!(actor = %actor, group_id = %group_id, user_id = %user_id, "user added to group");
        Ok(user)
    }

    pub async fn remove_user(&self, actor: Actor, group_id: Uuid, user_id: Uuid) -> AppResult<User> {
        let group = self.group(group_id).await?;
        let user = self.user(user_id).await?;
        if user.group_id != Some(group_id) {
            return Err(AppError::not_found("user is not a member of this group"));
        }
        if group.is_admin {
            require_admin(&self.checker, actor, "change administrator membership").await?;
        }

        let user = self.repo.set_user_group(user_id, None).await?;
        tracing::info!(actor = %actor, group_id = %group_id, user_id = %user_id, "user removed from group");
        Ok(user)
    }

    pub async fn assign_role(&self, actor: Actor, group_id: Uuid, role_id: Uuid) -> AppResult<GroupRole> {
        self.group(group_id).await?;
        if self.repo.get_role(role_id).await?.is_none() {
            return Err(AppError::not_found("role not found"));
        }
        if self.repo.group_role_exists(group_id, role_id).await? {
            return Err(AppError::conflict("role already assigned to this group"));
        }

        let link = self.repo.add_group_role(group_id, role_id).await?;
        tracing::info!(actor = %actor, group_id = %group_id, role_id = %role_id, "role assigned to group");
        Ok(link)
    }

    pub async fn remove_role(&self, actor: Actor, group_id: Uuid, role_id: Uuid) -> AppResult<()> {
        self.group(group_id).await?;
        if !self.repo.remove_group_role(group_id, role_id).await? {
            return Err(AppError::not_found("role is not assigned to this group"));
        }
        tracing::info!(actor = %actor, group_id = %group_id, role_id = %role_id, "role removed from group");
        Ok(())
    }
}
