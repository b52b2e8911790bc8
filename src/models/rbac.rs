use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::user::User;

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 50;
const RESOURCE_MIN: usize = 2;
const RESOURCE_MAX: usize = 30;

/// Trims a role, group or permission name and checks its length.
pub fn validate_name(kind: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < NAME_MIN {
        return Err(AppError::invalid(format!(
            "{kind} name must be at least {NAME_MIN} characters"
        )));
    }
    if len > NAME_MAX {
        return Err(AppError::invalid(format!(
            "{kind} name must be at most {NAME_MAX} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Resources are stored trimmed and lowercased.
pub fn normalize_resource(value: &str) -> AppResult<String> {
    let normalized = value.trim().to_lowercase();
    let len = normalized.chars().count();
    if len < RESOURCE_MIN {
        return Err(AppError::invalid(format!(
            "resource must be at least {RESOURCE_MIN} characters"
        )));
    }
    if len > RESOURCE_MAX {
        return Err(AppError::invalid(format!(
            "resource must be at most {RESOURCE_MAX} characters"
        )));
    }
    Ok(normalized)
}

// =============================================================================
// ACTION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    List,
    Manage,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::List,
        Action::Manage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::List => "list",
            Action::Manage => "manage",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
            .ok_or_else(|| {
                AppError::invalid(format!(
                    "action must be one of: create, read, update, delete, list, manage (got '{}')",
                    s.trim()
                ))
            })
    }
}

// =============================================================================
// PERMISSION
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub resource: String,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A (resource, action) capability as a caller names it. The action stays a
/// plain string: an unknown verb is simply never granted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct PermissionKey {
    #[schema(example = "products")]
    pub resource: String,
    #[schema(example = "read")]
    pub action: String,
}

impl PermissionKey {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

/// Entry of a user's effective permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PermissionGrant {
    pub resource: String,
    pub action: Action,
    pub name: String,
}

impl From<&Permission> for PermissionGrant {
    fn from(p: &Permission) -> Self {
        PermissionGrant {
            resource: p.resource.clone(),
            action: p.action,
            name: p.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PermissionCreateRequest {
    #[schema(example = "product_read")]
    pub name: String,
    #[schema(example = "products")]
    pub resource: String,
    #[schema(example = "read")]
    pub action: String,
    #[schema(example = "View products")]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPermission {
    pub name: String,
    pub resource: String,
    pub action: Action,
    pub description: Option<String>,
}

impl PermissionCreateRequest {
    pub fn validate(self) -> AppResult<NewPermission> {
        Ok(NewPermission {
            name: validate_name("permission", &self.name)?,
            resource: normalize_resource(&self.resource)?,
            action: self.action.parse()?,
            description: self.description,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PermissionUpdateRequest {
    pub name: Option<String>,
    pub resource: Option<String>,
    pub action: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionChanges {
    pub name: Option<String>,
    pub resource: Option<String>,
    pub action: Option<Action>,
    pub description: Option<String>,
}

impl PermissionUpdateRequest {
    pub fn validate(self) -> AppResult<PermissionChanges> {
        Ok(PermissionChanges {
            name: self.name.map(|n| validate_name("permission", &n)).transpose()?,
            resource: self.resource.map(|r| normalize_resource(&r)).transpose()?,
            action: self.action.map(|a| a.parse()).transpose()?,
            description: self.description,
        })
    }
}

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RoleCreateRequest {
    #[schema(example = "catalog_editor")]
    pub name: String,
    #[schema(example = "Maintains products and categories")]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
}

impl RoleCreateRequest {
    pub fn validate(self) -> AppResult<NewRole> {
        Ok(NewRole {
            name: validate_name("role", &self.name)?,
            description: self.description,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RoleUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RoleChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl RoleUpdateRequest {
    pub fn validate(self) -> AppResult<RoleChanges> {
        Ok(RoleChanges {
            name: self.name.map(|n| validate_name("role", &n)).transpose()?,
            description: self.description,
        })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleDetail {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
}

// =============================================================================
// GROUP
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GroupCreateRequest {
    #[schema(example = "editors")]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
    pub is_admin: bool,
}

impl GroupCreateRequest {
    pub fn validate(self) -> AppResult<NewGroup> {
        Ok(NewGroup {
            name: validate_name("group", &self.name)?,
            description: self.description,
            is_admin: self.is_admin,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct GroupUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_admin: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct GroupChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_admin: Option<bool>,
}

impl GroupUpdateRequest {
    pub fn validate(self) -> AppResult<GroupChanges> {
        Ok(GroupChanges {
            name: self.name.map(|n| validate_name("group", &n)).transpose()?,
            description: self.description,
            is_admin: self.is_admin,
        })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: Group,
    pub roles: Vec<Role>,
    pub members: Vec<User>,
}

// =============================================================================
// ASSOCIATIONS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupRole {
    pub group_id: Uuid,
    pub role_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// ACCESS GRAPH (loaded per decision, never stored)
// =============================================================================

/// User → Group → Role → Permission tree as loaded for one decision.
#[derive(Debug, Clone)]
pub struct UserAccess {
    pub user_id: Uuid,
    pub is_admin: bool,
    pub group: Option<GroupAccess>,
}

#[derive(Debug, Clone)]
pub struct GroupAccess {
    pub id: Uuid,
    pub name: String,
    pub is_admin: bool,
    pub roles: Vec<RoleAccess>,
}

#[derive(Debug, Clone)]
pub struct RoleAccess {
    pub id: Uuid,
    pub name: String,
    pub permissions: Vec<Permission>,
}

impl UserAccess {
    /// Blanket admin flag on the user or on its group.
    pub fn is_admin(&self) -> bool {
        self.is_admin || self.group.as_ref().is_some_and(|g| g.is_admin)
    }

    /// First role that grants the exact (resource, action) pair.
    pub fn granting_role(&self, resource: &str, action: &str) -> Option<&RoleAccess> {
        let group = self.group.as_ref()?;
        group.roles.iter().find(|role| {
            role.permissions
                .iter()
                .any(|p| p.resource == resource && p.action.as_str() == action)
        })
    }

    /// Union of reachable permissions, one entry per (resource, action).
    pub fn explicit_grants(&self) -> Vec<PermissionGrant> {
        let Some(group) = &self.group else {
            return Vec::new();
        };

        let mut seen: HashSet<(&str, Action)> = HashSet::new();
        let mut grants = Vec::new();
        for role in &group.roles {
            for permission in &role.permissions {
                if seen.insert((permission.resource.as_str(), permission.action)) {
                    grants.push(PermissionGrant::from(permission));
                }
            }
        }
        grants
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EffectivePermissions {
    pub user_id: Uuid,
    pub is_admin: bool,
    pub permissions: Vec<PermissionGrant>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminStatus {
    pub user_id: Uuid,
    pub is_admin: bool,
}

fn require_all_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PermissionCheckRequest {
    pub permissions: Vec<PermissionKey>,
    /// AND when true, OR when false.
    #[serde(default = "require_all_default")]
    pub require_all: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PermissionCheckResponse {
    pub has_permission: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permission(resource: &str, action: Action) -> Permission {
        let now = Utc::now();
        Permission {
            id: Uuid::new_v4(),
            name: format!("{resource}_{action}"),
            resource: resource.to_string(),
            action,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn action_parsing_is_case_insensitive_and_closed() {
        assert_eq!(" Read ".parse::<Action>().unwrap(), Action::Read);
        assert_eq!("MANAGE".parse::<Action>().unwrap(), Action::Manage);
        assert!(matches!(
            "publish".parse::<Action>(),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(validate_name("role", "  viewer ").unwrap(), "viewer");
        assert!(validate_name("role", " v ").is_err());
        assert!(validate_name("role", &"x".repeat(51)).is_err());
        assert!(validate_name("role", &"x".repeat(50)).is_ok());
    }

    #[test]
    fn permission_request_normalizes_resource_and_action() {
        let new = PermissionCreateRequest {
            name: " product_read ".into(),
            resource: "  Products ".into(),
            action: "READ".into(),
            description: None,
        }
        .validate()
        .unwrap();

        assert_eq!(new.name, "product_read");
        assert_eq!(new.resource, "products");
        assert_eq!(new.action, Action::Read);
    }

    #[test]
    fn permission_update_rejects_bad_action() {
        let req = PermissionUpdateRequest {
            action: Some("fly".into()),
            ..Default::default()
        };
        assert!(matches!(req.validate(), Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn explicit_grants_collapse_duplicates_across_roles() {
        let access = UserAccess {
            user_id: Uuid::new_v4(),
            is_admin: false,
            group: Some(GroupAccess {
                id: Uuid::new_v4(),
                name: "staff".into(),
                is_admin: false,
                roles: vec![
                    RoleAccess {
                        id: Uuid::new_v4(),
                        name: "viewer".into(),
                        permissions: vec![permission("products", Action::Read)],
                    },
                    RoleAccess {
                        id: Uuid::new_v4(),
                        name: "editor".into(),
                        permissions: vec![
                            permission("products", Action::Read),
                            permission("products", Action::Update),
                        ],
                    },
                ],
            }),
        };

        let grants = access.explicit_grants();
        assert_eq!(grants.len(), 2);
        assert_eq!(
            access.granting_role("products", "update").map(|r| r.name.as_str()),
            Some("editor")
        );
        assert!(access.granting_role("products", "delete").is_none());
    }

    #[test]
    fn group_admin_flag_counts_as_admin() {
        let access = UserAccess {
            user_id: Uuid::new_v4(),
            is_admin: false,
            group: Some(GroupAccess {
                id: Uuid::new_v4(),
                name: "super_admins".into(),
                is_admin: true,
                roles: Vec::new(),
            }),
        };
        assert!(access.is_admin());

        let orphan = UserAccess {
            user_id: Uuid::new_v4(),
            is_admin: false,
            group: None,
        };
        assert!(!orphan.is_admin());
        assert!(orphan.explicit_grants().is_empty());
    }
}
