mod common;

use anyhow::Result;

use common::Harness;
use storefront_rbac::authz::{groups, roles, RbacSeed};
use storefront_rbac::errors::AppError;
use storefront_rbac::models::rbac::PermissionKey;
use storefront_rbac::repo::RbacRepository;

async fn counts(h: &Harness) -> Result<(usize, usize, usize, i64, i64)> {
    let repo = &h.state.repo;
    Ok((
        repo.list_permissions().await?.len(),
        repo.list_roles().await?.len(),
        repo.list_groups().await?.len(),
        repo.count_role_permissions().await?,
        repo.count_group_roles().await?,
    ))
}

#[tokio::test]
async fn default_layout_is_provisioned() -> Result<()> {
    let h = Harness::new().await?;
    let report = h.state.manager.bootstrap().await?;

    assert_eq!(report.permissions, 16);
    assert_eq!(report.roles, 4);
    assert_eq!(report.groups, 3);
    // super_admin 16 + admin 4 + moderator 0 + user 1
    assert_eq!(report.role_permissions, 21);
    assert_eq!(report.group_roles, 3);

    let repo = &h.state.repo;
    let super_admins = repo.find_group_by_name(groups::SUPER_ADMINS).await?.expect("group");
    assert!(super_admins.is_admin);
    let admins = repo.find_group_by_name(groups::ADMINS).await?.expect("group");
    assert!(!admins.is_admin);

    let user_role = repo.find_role_by_name(roles::USER).await?.expect("role");
    let granted = repo.role_permissions(user_role.id).await?;
    assert_eq!(granted.len(), 1);
    assert_eq!(granted[0].resource, "users");
    assert_eq!(granted[0].name, "user_read");

    let moderator = repo.find_role_by_name(roles::MODERATOR).await?.expect("role");
    assert!(repo.role_permissions(moderator.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn second_run_changes_nothing() -> Result<()> {
    let h = Harness::new().await?;
    h.state.manager.bootstrap().await?;
    let once = counts(&h).await?;

    let report = h.state.manager.bootstrap().await?;
    assert_eq!(report.total(), 0);
    assert_eq!(counts(&h).await?, once);
    Ok(())
}

#[tokio::test]
async fn bootstrap_fills_gaps_left_by_manual_changes() -> Result<()> {
    let h = Harness::new().await?;
    h.state.manager.bootstrap().await?;

    let repo = &h.state.repo;
    let role = repo.find_role_by_name(roles::ADMIN).await?.expect("role");
    h.state.roles.delete(common::ACTOR, role.id).await?;

    let report = h.state.manager.bootstrap().await?;
    assert_eq!(report.roles, 1);
    assert_eq!(report.role_permissions, 4);
    assert_eq!(report.group_roles, 1);
    assert_eq!(report.permissions, 0);
    Ok(())
}

#[tokio::test]
async fn bootstrapped_groups_drive_decisions() -> Result<()> {
    let h = Harness::new().await?;
    h.state.manager.bootstrap().await?;
    let repo = &h.state.repo;

    let admins = repo.find_group_by_name(groups::ADMINS).await?.expect("group");
    let member = h.user("staff@x.com", Some(admins.id), false).await?;
    let checker = &h.state.checker;

    assert!(checker.check_permission(member.id, "users", "update").await?);
    assert!(checker.check_permission(member.id, "groups", "read").await?);
    assert!(!checker.check_permission(member.id, "groups", "delete").await?);
    assert!(!checker.is_admin(member.id).await?);

    let super_admins = repo.find_group_by_name(groups::SUPER_ADMINS).await?.expect("group");
    let root = h.user("root@x.com", Some(super_admins.id), false).await?;
    assert!(checker.is_admin(root.id).await?);
    Ok(())
}

#[tokio::test]
async fn custom_seed_skips_unknown_references() -> Result<()> {
    let h = Harness::new().await?;
    let seed = RbacSeed::from_json(
        r#"{
            "permissions": [
                { "name": "product_read", "resource": "Products", "action": "read" },
                { "name": "product_update", "resource": "products", "action": "update" }
            ],
            "roles": [
                { "name": "catalog", "permissions": [
                    { "resource": "products", "action": "read" },
                    { "resource": "products", "action": "update" },
                    { "resource": "warehouses", "action": "read" }
                ] }
            ],
            "groups": [
                { "name": "merch", "roles": ["catalog", "ghost"] }
            ]
        }"#,
    )?;

    let report = h.state.manager.bootstrap_with(&seed).await?;
    assert_eq!(report.permissions, 2);
    assert_eq!(report.roles, 1);
    assert_eq!(report.groups, 1);
    assert_eq!(report.role_permissions, 2);
    assert_eq!(report.group_roles, 1);

    let merch = h.state.repo.find_group_by_name("merch").await?.expect("group");
    let user = h.user("m@x.com", Some(merch.id), false).await?;
    assert!(
        h.state
            .checker
            .check_multiple_permissions(
                user.id,
                &[PermissionKey::new("products", "read"), PermissionKey::new("products", "update")],
                true,
            )
            .await?
    );
    Ok(())
}

#[tokio::test]
async fn assigning_to_missing_role_is_not_found() -> Result<()> {
    let h = Harness::new().await?;
    let err = h
        .state
        .manager
        .assign_permissions_to_role("nobody", &[PermissionKey::new("users", "read")])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {err}");
    Ok(())
}

#[test]
fn malformed_seed_is_a_configuration_error() {
    let err = RbacSeed::from_json("{ \"permissions\": 3 }").unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)), "got {err}");
}
