//! Authorization core
//!
//! - [`PermissionChecker`]: decisions over User → Group → Role → Permission
//! - [`AuthorizationGate`]: request pipeline stage (401 / 403 / allow)
//! - [`RbacManager`]: idempotent provisioning of the default layout

mod checker;
mod gate;
mod manager;
mod principal;

pub use checker::PermissionChecker;
pub use gate::{authenticate, AuthorizationGate, RequireLayer, RequireService, Requirement};
pub use manager::{GroupSpec, PermissionSpec, RbacManager, RbacSeed, RoleSpec, SeedReport};
pub use principal::{bearer_token, Actor, CredentialVerifier, Principal};

/// Resources guarded by the RBAC admin API
pub mod resources {
    pub const USERS: &str = "users";
    pub const GROUPS: &str = "groups";
    pub const ROLES: &str = "roles";
    pub const PERMISSIONS: &str = "permissions";
}

/// Well-known role names
pub mod roles {
    pub const SUPER_ADMIN: &str = "super_admin";
    pub const ADMIN: &str = "admin";
    pub const MODERATOR: &str = "moderator";
    pub const USER: &str = "user";
}

/// Well-known group names
pub mod groups {
    pub const SUPER_ADMINS: &str = "super_admins";
    pub const ADMINS: &str = "admins";
    pub const USERS: &str = "users";
}
