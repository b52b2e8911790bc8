use std::sync::Arc;

use uuid::Uuid;

use crate::authz::Actor;
use crate::errors::{AppError, AppResult};
use crate::models::rbac::{
    Permission, Role, RoleCreateRequest, RoleDetail, RolePermission, RoleUpdateRequest,
};
use crate::repo::RbacRepository;

#[derive(Clone)]
pub struct RoleService {
    repo: Arc<dyn RbacRepository>,
}

impl RoleService {
    pub fn new(repo: Arc<dyn RbacRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, actor: Actor, req: RoleCreateRequest) -> AppResult<Role> {
        let new = req.validate()?;
        if self.repo.find_role_by_name(&new.name).await?.is_some() {
            return Err(AppError::conflict(format!("role '{}' already exists", new.name)));
        }

        let role = self.repo.create_role(new).await?;
        tracing::info!(actor = %actor, role_id = %role.id, role = %role.name, "role created");
        Ok(role)
    }

    async fn role(&self, id: Uuid) -> AppResult<Role> {
        self.repo
            .get_role(id)
            .await?
            .ok_or_else(|| AppError::not_found("role not found"))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<RoleDetail> {
        let role = self.role(id).await?;
        let permissions = self.repo.role_permissions(id).await?;
        Ok(RoleDetail { role, permissions })
    }

    pub async fn list(&self) -> AppResult<Vec<Role>> {
        self.repo.list_roles().await
    }

    pub async fn update(&self, actor: Actor, id: Uuid, req: RoleUpdateRequest) -> AppResult<Role> {
        let changes = req.validate()?;
        self.role(id).await?;

        if let Some(name) = &changes.name {
            if let Some(other) = self.repo.find_role_by_name(name).await? {
                if other.id != id {
                    return Err(AppError::conflict(format!("role '{name}' already exists")));
                }
            }
        }

        let role = self.repo.update_role(id, changes).await?;
        tracing::info!(actor = %actor, role_id = %id, "role updated");
        Ok(role)
    }

    pub async fn delete(&self, actor: Actor, id: Uuid) -> AppResult<()> {
        if !self.repo.delete_role(id).await? {
            return Err(AppError::not_found("role not found"));
        }
        tracing::info!(actor = %actor, role_id = %id, "role deleted");
        Ok(())
    }

    pub async fn permissions(&self, id: Uuid) -> AppResult<Vec<Permission>> {
        self.role(id).await?;
        self.repo.role_permissions(id).await
    }

    pub async fn assign_permission(&self, actor: Actor, role_id: Uuid, permission_id: Uuid) -> AppResult<RolePermission> {
        self.role(role_id).await?;
        if self.repo.get_permission(permission_id).await?.is_none() {
            return Err(AppError::not_found("permission not found"));
        }
        if self.repo.role_permission_exists(role_id, permission_id).await? {
            return Err(AppError::conflict("permission already assigned to this role"));
        }

        let link = self.repo.add_role_permission(role_id, permission_id).await?;
        tracing::info!(
            actor = %actor,
            role_id = %role_id,
            permission_id = %permission_id,
            "permission assigned to role"
        );
        Ok(link)
    }

    pub async fn remove_permission(&self, actor: Actor, role_id: Uuid, permission_id: Uuid) -> AppResult<()> {
        self.role(role_id).await?;
        if !self.repo.remove_role_permission(role_id, permission_id).await? {
            return Err(AppError::not_found("permission is not assigned to this role"));
        }
        tracing::info!(
            actor = %actor,
            role_id = %role_id,
            permission_id = %permission_id,
            "permission removed from role"
        );
        Ok(())
    }
}
