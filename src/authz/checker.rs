use std::sync::Arc;

use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::rbac::{PermissionGrant, PermissionKey};
use crate::repo::RbacRepository;

/// Decision engine over the User → Group → Role → Permission graph.
///
/// Every call reads the graph afresh through the repository. Unknown users
/// are denied, never reported as errors; the only `Err` is an infrastructure
/// failure, which callers must treat as a denial.
#[derive(Clone)]
pub struct PermissionChecker {
    repo: Arc<dyn RbacRepository>,
}

impl PermissionChecker {
    pub fn new(repo: Arc<dyn RbacRepository>) -> Self {
        Self { repo }
    }

    /// Admin flag on the user, or on the user's group.
    pub async fn is_admin(&self, user_id: Uuid) -> AppResult<bool> {
        let Some((user, group)) = self.repo.find_user_with_group(user_id).await? else {
            tracing::debug!(user_id = %user_id, "unknown user, not admin");
            return Ok(false);
        };

        let admin = user.is_admin || group.as_ref().is_some_and(|g| g.is_admin);
        tracing::debug!(user_id = %user_id, admin, "admin check");
        Ok(admin)
    }

    /// Exact (resource, action) match through the group's roles. Admins pass
    /// regardless of explicit grants.
    pub async fn check_permission(&self, user_id: Uuid, resource: &str, action: &str) -> AppResult<bool> {
        let resource = resource.trim().to_lowercase();
        let action = action.trim().to_lowercase();

        let Some(access) = self.repo.load_access(user_id).await? else {
            tracing::debug!(user_id = %user_id, %resource, %action, "denied: unknown user");
            return Ok(false);
        };

        if access.is_admin() {
            tracing::debug!(user_id = %user_id, %resource, %action, "allowed: admin bypass");
            return Ok(true);
        }

        if let Some(role) = access.granting_role(&resource, &action) {
            tracing::debug!(
                user_id = %user_id,
                %resource,
                %action,
                role = %role.name,
                "allowed: explicit grant"
            );
            return Ok(true);
        }

        tracing::debug!(user_id = %user_id, %resource, %action, "denied: no matching grant");
        Ok(false)
    }

    /// AND (`require_all`) or OR over `check_permission`. Empty lists are
    /// vacuously true for AND and false for OR.
    pub async fn check_multiple_permissions(
        &self,
        user_id: Uuid,
        permissions: &[PermissionKey],
        require_all: bool,
    ) -> AppResult<bool> {
        for key in permissions {
            let granted = self.check_permission(user_id, &key.resource, &key.action).await?;
            if require_all && !granted {
                return Ok(false);
            }
            if !require_all && granted {
                return Ok(true);
            }
        }
        Ok(require_all)
    }

    /// Admins get the whole catalog; everyone else the de-duplicated union of
    /// grants reachable through their group.
    pub async fn get_user_permissions(&self, user_id: Uuid) -> AppResult<Vec<PermissionGrant>> {
        let Some(access) = self.repo.load_access(user_id).await? else {
            return Ok(Vec::new());
        };

        if access.is_admin() {
            let catalog = self.repo.list_permissions().await?;
            return Ok(catalog.iter().map(PermissionGrant::from).collect());
        }

        Ok(access.explicit_grants())
    }
}
