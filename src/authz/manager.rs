use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{groups, resources, roles};
use crate::errors::{AppError, AppResult};
use crate::models::rbac::{
    normalize_resource, validate_name, Action, NewGroup, NewPermission, NewRole, PermissionKey,
};
use crate::repo::RbacRepository;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionSpec {
    pub name: String,
    pub resource: String,
    pub action: Action,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Granted through `assign_permissions_to_role`; unknown pairs are skipped.
    #[serde(default)]
    pub permissions: Vec<PermissionKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Everything `bootstrap` provisions. `Default` is the built-in storefront
/// layout; a JSON file of the same shape replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RbacSeed {
    #[serde(default)]
    pub permissions: Vec<PermissionSpec>,
    #[serde(default)]
    pub roles: Vec<RoleSpec>,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
}

impl RbacSeed {
    pub fn from_json(raw: &str) -> AppResult<Self> {
        serde_json::from_str(raw).map_err(|e| AppError::configuration(format!("invalid RBAC seed: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::configuration(format!("cannot read RBAC seed {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }
}

impl Default for RbacSeed {
    fn default() -> Self {
        let managed = [
            (resources::USERS, "user"),
            (resources::GROUPS, "group"),
            (resources::ROLES, "role"),
            (resources::PERMISSIONS, "permission"),
        ];
        let crud = [Action::Create, Action::Read, Action::Update, Action::Delete];

        let mut permissions = Vec::new();
        for (resource, singular) in managed {
            for action in crud {
                permissions.push(PermissionSpec {
                    name: format!("{singular}_{action}"),
                    resource: resource.to_string(),
                    action,
                    description: Some(format!("{action} {resource}")),
                });
            }
        }

        let key = |resource: &str, action: Action| PermissionKey::new(resource, action.as_str());
        let everything = permissions
            .iter()
            .map(|p| key(&p.resource, p.action))
            .collect();

        let role = |name: &str, description: &str, permissions: Vec<PermissionKey>| RoleSpec {
            name: name.to_string(),
            description: Some(description.to_string()),
            permissions,
        };
        let group = |name: &str, description: &str, is_admin: bool, role: &str| GroupSpec {
            name: name.to_string(),
            description: Some(description.to_string()),
            is_admin,
            roles: vec![role.to_string()],
        };

        RbacSeed {
            permissions,
            roles: vec![
                role(roles::SUPER_ADMIN, "Full access to every resource", everything),
                role(
                    roles::ADMIN,
                    "Manages users and reads groups",
                    vec![
                        key(resources::USERS, Action::Create),
                        key(resources::USERS, Action::Read),
                        key(resources::USERS, Action::Update),
                        key(resources::GROUPS, Action::Read),
                    ],
                ),
                role(roles::MODERATOR, "Moderates content", Vec::new()),
                role(roles::USER, "Regular customer", vec![key(resources::USERS, Action::Read)]),
            ],
            groups: vec![
                group(groups::SUPER_ADMINS, "Senior administrators", true, roles::SUPER_ADMIN),
                group(groups::ADMINS, "Administrators", false, roles::ADMIN),
                group(groups::USERS, "Regular users", false, roles::USER),
            ],
        }
    }
}

/// Rows created by one provisioning run. A repeat run reports all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SeedReport {
    pub permissions: usize,
    pub roles: usize,
    pub groups: usize,
    pub role_permissions: usize,
    pub group_roles: usize,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.permissions + self.roles + self.groups + self.role_permissions + self.group_roles
    }
}

/// Idempotent provisioning of permissions, roles, groups and their links.
/// Every step looks up by unique key first and only creates what is missing.
#[derive(Clone)]
pub struct RbacManager {
    repo: Arc<dyn RbacRepository>,
}

impl RbacManager {
    pub fn new(repo: Arc<dyn RbacRepository>) -> Self {
        Self { repo }
    }

    pub async fn seed_permissions(&self, specs: &[PermissionSpec]) -> AppResult<usize> {
        let mut created = 0;
        for spec in specs {
            let resource = normalize_resource(&spec.resource)?;
            if self.repo.find_permission(&resource, spec.action.as_str()).await?.is_some() {
                continue;
            }

            let new = NewPermission {
                name: validate_name("permission", &spec.name)?,
                resource,
                action: spec.action,
                description: spec.description.clone(),
            };
            if created_unless_conflict(self.repo.create_permission(new).await)? {
                created += 1;
            }
        }
        Ok(created)
    }

    pub async fn seed_roles(&self, specs: &[RoleSpec]) -> AppResult<usize> {
        let mut created = 0;
        for spec in specs {
            let name = validate_name("role", &spec.name)?;
            if self.repo.find_role_by_name(&name).await?.is_some() {
                continue;
            }

            let new = NewRole {
                name,
                description: spec.description.clone(),
            };
            if created_unless_conflict(self.repo.create_role(new).await)? {
                created += 1;
            }
        }
        Ok(created)
    }

    pub async fn seed_groups(&self, specs: &[GroupSpec]) -> AppResult<usize> {
        let mut created = 0;
        for spec in specs {
            let name = validate_name("group", &spec.name)?;
            if self.repo.find_group_by_name(&name).await?.is_some() {
                continue;
            }

            let new = NewGroup {
                name,
                description: spec.description.clone(),
                is_admin: spec.is_admin,
            };
            if created_unless_conflict(self.repo.create_group(new).await)? {
                created += 1;
            }
        }
        Ok(created)
    }

    /// Links permissions to an existing role. A missing role is an error; a
    /// missing permission is skipped without failing the batch.
    pub async fn assign_permissions_to_role(&self, role_name: &str, permissions: &[PermissionKey]) -> AppResult<usize> {
        let role = self
            .repo
            .find_role_by_name(role_name.trim())
            .await?
            .ok_or_else(|| AppError::not_found(format!("role '{role_name}' does not exist")))?;

        let mut created = 0;
        for key in permissions {
            let resource = key.resource.trim().to_lowercase();
            let action = key.action.trim().to_lowercase();
            let Some(permission) = self.repo.find_permission(&resource, &action).await? else {
                tracing::debug!(role = %role.name, permission = %key, "skipping unknown permission");
                continue;
            };

            if self.repo.role_permission_exists(role.id, permission.id).await? {
                continue;
            }
            if created_unless_conflict(self.repo.add_role_permission(role.id, permission.id).await)? {
                created += 1;
            }
        }
        Ok(created)
    }

    /// Links roles to an existing group, skipping unknown role names.
    pub async fn assign_roles_to_group(&self, group_name: &str, role_names: &[String]) -> AppResult<usize> {
        let group = self
            .repo
            .find_group_by_name(group_name.trim())
            .await?
            .ok_or_else(|| AppError::not_found(format!("group '{group_name}' does not exist")))?;

        let mut created = 0;
        for role_name in role_names {
            let Some(role) = self.repo.find_role_by_name(role_name.trim()).await? else {
                tracing::debug!(group = %group.name, role = %role_name, "skipping unknown role");
                continue;
            };

            if self.repo.group_role_exists(group.id, role.id).await? {
                continue;
            }
            if created_unless_conflict(self.repo.add_group_role(group.id, role.id).await)? {
                created += 1;
            }
        }
        Ok(created)
    }

    pub async fn bootstrap(&self) -> AppResult<SeedReport> {
        self.bootstrap_with(&RbacSeed::default()).await
    }

    /// Permissions, then roles, then groups, then role grants, then group
    /// roles. Safe to re-run.
    pub async fn bootstrap_with(&self, seed: &RbacSeed) -> AppResult<SeedReport> {
        let mut report = SeedReport {
            permissions: self.seed_permissions(&seed.permissions).await?,
            roles: self.seed_roles(&seed.roles).await?,
            groups: self.seed_groups(&seed.groups).await?,
            ..SeedReport::default()
        };

        for role in &seed.roles {
            report.role_permissions += self
                .assign_permissions_to_role(&role.name, &role.permissions)
                .await?;
        }
        for group in &seed.groups {
            report.group_roles += self.assign_roles_to_group(&group.name, &group.roles).await?;
        }

        tracing::info!(
            permissions = report.permissions,
            roles = report.roles,
            groups = report.groups,
            role_permissions = report.role_permissions,
            group_roles = report.group_roles,
            "rbac bootstrap complete"
        );
        Ok(report)
    }
}

/// A concurrent seeder may win the insert; that still counts as present.
fn created_unless_conflict<T>(result: AppResult<T>) -> AppResult<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(AppError::Conflict(_)) => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_seed_matches_storefront_layout() {
        let seed = RbacSeed::default();
        assert_eq!(seed.permissions.len(), 16);
        assert_eq!(seed.roles.len(), 4);
        assert_eq!(seed.groups.len(), 3);

        let super_admin = seed.roles.iter().find(|r| r.name == roles::SUPER_ADMIN).unwrap();
        assert_eq!(super_admin.permissions.len(), 16);

        let admin = seed.roles.iter().find(|r| r.name == roles::ADMIN).unwrap();
        assert!(admin.permissions.contains(&PermissionKey::new("groups", "read")));
        assert!(!admin.permissions.contains(&PermissionKey::new("users", "delete")));

        let admins_group = seed.groups.iter().find(|g| g.name == groups::SUPER_ADMINS).unwrap();
        assert!(admins_group.is_admin);
        assert!(seed.permissions.iter().any(|p| p.name == "permission_delete"));
    }

    #[test]
    fn seed_parses_from_json_with_defaults() {
        let seed = RbacSeed::from_json(
            r#"{
                "permissions": [{"name": "product_read", "resource": "products", "action": "read"}],
                "roles": [{"name": "viewer", "permissions": [{"resource": "products", "action": "read"}]}],
                "groups": [{"name": "readers", "roles": ["viewer"]}]
            }"#,
        )
        .unwrap();

        assert_eq!(seed.permissions[0].action, Action::Read);
        assert!(!seed.groups[0].is_admin);
        assert!(RbacSeed::from_json(r#"{"permissions": [{"name": "x", "resource": "y", "action": "fly"}]}"#).is_err());
    }
}
