//! Administrative operations over the RBAC graph and user accounts.
//!
//! Each service takes validated request DTOs, checks existence immediately
//! before writing, and returns entity DTOs or `NotFound` / `Conflict` /
//! `InvalidArgument`. Mutations are logged with the acting user.
//!
//! Route permissions (`users:update`, `groups:update`, ...) are not enough to
//! touch admin status: granting or revoking it, moving users in or out of an
//! admin group, and editing admin accounts also require the actor to be an
//! admin.

pub mod accounts;
pub mod groups;
pub mod permissions;
pub mod roles;
pub mod users;

pub use accounts::AccountService;
pub use groups::GroupService;
pub use permissions::PermissionService;
pub use roles::RoleService;
pub use users::UserService;

use crate::authz::{Actor, PermissionChecker};
use crate::errors::{AppError, AppResult};

pub(crate) async fn require_admin(checker: &PermissionChecker, actor: Actor, change: &str) -> AppResult<()> {
    let Actor::User(id) = actor else {
        return Ok(());
    };
    if checker.is_admin(id).await? {
        return Ok(());
    }
    tracing::warn!(actor = %id, change, "admin-only change refused");
    Err(AppError::forbidden(format!("only administrators may {change}")))
}
