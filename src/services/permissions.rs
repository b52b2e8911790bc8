use std::sync::Arc;

use uuid::Uuid;

use crate::authz::Actor;
use crate::errors::{AppError, AppResult};
use crate::models::rbac::{normalize_resource, Action, Permission, PermissionCreateRequest, PermissionUpdateRequest};
use crate::repo::RbacRepository;

#[derive(Clone)]
pub struct PermissionService {
    repo: Arc<dyn RbacRepository>,
}

impl PermissionService {
    pub fn new(repo: Arc<dyn RbacRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, actor: Actor, req: PermissionCreateRequest) -> AppResult<Permission> {
        let new = req.validate()?;
        if self.repo.find_permission(&new.resource, new.action.as_str()).await?.is_some() {
            return Err(AppError::conflict(format!(
                "permission {}:{} already exists",
                new.resource, new.action
            )));
        }

        let permission = self.repo.create_permission(new).await?;
        tracing::info!(
            actor = %actor,
            permission_id = %permission.id,
            resource = %permission.resource,
            action = %permission.action,
            "permission created"
        );
        Ok(permission)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Permission> {
        self.repo
            .get_permission(id)
            .await?
            .ok_or_else(|| AppError::not_found("permission not found"))
    }

    pub async fn find(&self, resource: &str, action: &str) -> AppResult<Permission> {
        let resource = normalize_resource(resource)?;
        let action: Action = action.parse()?;
        self.repo
            .find_permission(&resource, action.as_str())
            .await?
            .ok_or_else(|| AppError::not_found(format!("permission {resource}:{action} not found")))
    }

    pub async fn list(&self) -> AppResult<Vec<Permission>> {
        self.repo.list_permissions().await
    }

    pub async fn list_by_resource(&self, resource: &str) -> AppResult<Vec<Permission>> {
        let resource = normalize_resource(resource)?;
        self.repo.list_permissions_by_resource(&resource).await
    }

    pub async fn update(&self, actor: Actor, id: Uuid, req: PermissionUpdateRequest) -> AppResult<Permission> {
        let changes = req.validate()?;
        let current = self.get(id).await?;

        let resource = changes.resource.as_deref().unwrap_or(&current.resource);
        let action = changes.action.unwrap_or(current.action);
        if let Some(other) = self.repo.find_permission(resource, action.as_str()).await? {
            if other.id != id {
                return Err(AppError::conflict(format!(
                    "permission {resource}:{action} already exists"
                )));
            }
        }

        let permission = self.repo.update_permission(id, changes).await?;
        tracing::info!(actor = %actor, permission_id = %id, "permission updated");
        Ok(permission)
    }

    pub async fn delete(&self, actor: Actor, id: Uuid) -> AppResult<()> {
        if !self.repo.delete_permission(id).await? {
            return Err(AppError::not_found("permission not found"));
        }
        tracing::info!(actor = %actor, permission_id = %id, "permission deleted");
        Ok(())
    }
}
