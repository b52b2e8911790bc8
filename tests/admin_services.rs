mod common;

use anyhow::Result;
use uuid::Uuid;

use common::{Harness, ACTOR};
use storefront_rbac::authz::Actor;
use storefront_rbac::errors::AppError;
use storefront_rbac::models::rbac::{
    GroupCreateRequest, GroupUpdateRequest, PermissionCreateRequest, PermissionUpdateRequest,
    RoleCreateRequest,
};
use storefront_rbac::models::user::{UserStatus, UserUpdateRequest};
use storefront_rbac::repo::RbacRepository;

#[tokio::test]
async fn duplicate_links_conflict_and_leave_sets_unchanged() -> Result<()> {
    let h = Harness::new().await?;
    let read = h.permission("products", "read").await?;
    let viewer = h.role("viewer").await?;
    let readers = h.group("readers", false).await?;

    h.grant(&viewer, &read).await?;
    let err = h.state.roles.assign_permission(ACTOR, viewer.id, read.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {err}");
    assert_eq!(h.state.repo.count_role_permissions().await?, 1);

    h.attach(&readers, &viewer).await?;
    let err = h.state.groups.assign_role(ACTOR, readers.id, viewer.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {err}");
    assert_eq!(h.state.repo.count_group_roles().await?, 1);
    Ok(())
}

#[tokio::test]
async fn unique_keys_are_enforced() -> Result<()> {
    let h = Harness::new().await?;
    h.permission("products", "read").await?;
    h.role("viewer").await?;
    h.group("readers", false).await?;
    h.user("a@x.com", None, false).await?;

    let err = h
        .state
        .permissions
        .create(
            ACTOR,
            PermissionCreateRequest {
                name: "another_name".into(),
                resource: "PRODUCTS".into(),
                action: "read".into(),
                description: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {err}");

    let err = h
        .state
        .roles
        .create(ACTOR, RoleCreateRequest { name: "viewer".into(), description: None })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {err}");

    let err = h.group("readers", true).await.unwrap_err();
    assert!(err.to_string().contains("conflict"), "got {err}");

    let err = h.user("A@X.com", None, false).await.unwrap_err();
    assert!(err.to_string().contains("conflict"), "got {err}");
    Ok(())
}

#[tokio::test]
async fn invalid_input_is_rejected() -> Result<()> {
    let h = Harness::new().await?;

    let err = h
        .state
        .permissions
        .create(
            ACTOR,
            PermissionCreateRequest {
                name: "product_fly".into(),
                resource: "products".into(),
                action: "fly".into(),
                description: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)), "got {err}");

    let err = h
        .state
        .roles
        .create(ACTOR, RoleCreateRequest { name: "   ".into(), description: None })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)), "got {err}");
    Ok(())
}

#[tokio::test]
async fn updating_permission_onto_existing_pair_conflicts() -> Result<()> {
    let h = Harness::new().await?;
    h.permission("products", "read").await?;
    let update = h.permission("products", "update").await?;

    let err = h
        .state
        .permissions
        .update(
            ACTOR,
            update.id,
            PermissionUpdateRequest {
                action: Some("read".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {err}");

    let renamed = h
        .state
        .permissions
        .update(
            ACTOR,
            update.id,
            PermissionUpdateRequest {
                description: Some("Edit products".into()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(renamed.description.as_deref(), Some("Edit products"));
    assert_eq!(renamed.resource, "products");
    Ok(())
}

#[tokio::test]
async fn deleting_permission_removes_its_grants() -> Result<()> {
    let h = Harness::new().await?;
    let read = h.permission("products", "read").await?;
    let viewer = h.role("viewer").await?;
    let readers = h.group("readers", false).await?;
    h.grant(&viewer, &read).await?;
    h.attach(&readers, &viewer).await?;
    let user = h.user("a@x.com", Some(readers.id), false).await?;

    h.state.permissions.delete(ACTOR, read.id).await?;

    assert_eq!(h.state.repo.count_role_permissions().await?, 0);
    assert!(!h.state.checker.check_permission(user.id, "products", "read").await?);
    assert!(h.state.roles.get(viewer.id).await?.permissions.is_empty());
    Ok(())
}

#[tokio::test]
async fn deleting_role_removes_both_link_kinds() -> Result<()> {
    let h = Harness::new().await?;
    let read = h.permission("products", "read").await?;
    let viewer = h.role("viewer").await?;
    let readers = h.group("readers", false).await?;
    h.grant(&viewer, &read).await?;
    h.attach(&readers, &viewer).await?;

    h.state.roles.delete(ACTOR, viewer.id).await?;

    assert_eq!(h.state.repo.count_role_permissions().await?, 0);
    assert_eq!(h.state.repo.count_group_roles().await?, 0);
    assert!(h.state.groups.get(readers.id).await?.roles.is_empty());
    // the permission itself survives
    assert_eq!(h.state.permissions.get(read.id).await?.id, read.id);
    Ok(())
}

#[tokio::test]
async fn deleting_group_orphans_members() -> Result<()> {
    let h = Harness::new().await?;
    let viewer = h.role("viewer").await?;
    let readers = h.group("readers", true).await?;
    h.attach(&readers, &viewer).await?;
    let user = h.user("a@x.com", Some(readers.id), false).await?;
    assert!(h.state.checker.is_admin(user.id).await?);

    h.state.groups.delete(ACTOR, readers.id).await?;

    let user = h.state.users.get(user.id).await?;
    assert_eq!(user.group_id, None);
    assert!(!h.state.checker.is_admin(user.id).await?);
    assert_eq!(h.state.repo.count_group_roles().await?, 0);
    // the role itself survives
    assert_eq!(h.state.roles.get(viewer.id).await?.role.id, viewer.id);
    Ok(())
}

#[tokio::test]
async fn group_detail_lists_roles_and_members() -> Result<()> {
    let h = Harness::new().await?;
    let viewer = h.role("viewer").await?;
    let readers = h.group("readers", false).await?;
    h.attach(&readers, &viewer).await?;
    let a = h.user("a@x.com", None, false).await?;

    let moved = h.state.groups.add_user(ACTOR, readers.id, a.id).await?;
    assert_eq!(moved.group_id, Some(readers.id));

    let detail = h.state.groups.get(readers.id).await?;
    assert_eq!(detail.roles.len(), 1);
    assert_eq!(detail.members.len(), 1);
    assert_eq!(detail.members[0].id, a.id);

    let other = h.group("others", false).await?;
    let err = h.state.groups.remove_user(ACTOR, other.id, a.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {err}");

    let left = h.state.groups.remove_user(ACTOR, readers.id, a.id).await?;
    assert_eq!(left.group_id, None);
    Ok(())
}

#[tokio::test]
async fn missing_targets_are_not_found() -> Result<()> {
    let h = Harness::new().await?;
    let viewer = h.role("viewer").await?;
    let readers = h.group("readers", false).await?;
    let ghost = Uuid::new_v4();

    let err = h.state.roles.assign_permission(ACTOR, viewer.id, ghost).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {err}");
    let err = h.state.groups.assign_role(ACTOR, readers.id, ghost).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {err}");
    let err = h.state.roles.remove_permission(ACTOR, viewer.id, ghost).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {err}");
    let err = h.state.users.set_group(ACTOR, ghost, Some(readers.id)).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {err}");
    let err = h.state.permissions.delete(ACTOR, ghost).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {err}");
    Ok(())
}

#[tokio::test]
async fn updates_apply_partially() -> Result<()> {
    let h = Harness::new().await?;
    let readers = h.group("readers", false).await?;
    let updated = h
        .state
        .groups
        .update(
            ACTOR,
            readers.id,
            GroupUpdateRequest {
                is_admin: Some(true),
                ..Default::default()
            },
        )
        .await?;
    assert!(updated.is_admin);
    assert_eq!(updated.name, "readers");

    let user = h.user("a@x.com", None, false).await?;
    assert_eq!(user.status, UserStatus::Active);
    let user = h
        .state
        .users
        .update(
            ACTOR,
            user.id,
            UserUpdateRequest {
                status: Some(UserStatus::Inactive),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(user.status, UserStatus::Inactive);
    assert!(!user.is_admin);
    Ok(())
}

#[tokio::test]
async fn permissions_by_resource_and_pair_lookup() -> Result<()> {
    let h = Harness::new().await?;
    h.permission("products", "read").await?;
    h.permission("products", "delete").await?;
    h.permission("orders", "read").await?;

    assert_eq!(h.state.permissions.list_by_resource("products").await?.len(), 2);
    let found = h.state.permissions.find("orders", "read").await?;
    assert_eq!(found.name, "orders_read");

    let err = h.state.permissions.find("orders", "delete").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {err}");
    Ok(())
}

#[tokio::test]
async fn admin_status_changes_need_an_admin_actor() -> Result<()> {
    let h = Harness::new().await?;
    let staff_group = h.group("staff", false).await?;
    let root_group = h.group("root", true).await?;
    let staff = h.user("staff@x.com", Some(staff_group.id), false).await?;
    let root = h.user("root@x.com", Some(root_group.id), false).await?;
    let as_staff = Actor::User(staff.id);
    let as_root = Actor::User(root.id);

    let forbidden = |err: AppError| assert!(matches!(err, AppError::Forbidden(_)), "got {err}");

    forbidden(
        h.state
            .users
            .update(as_staff, staff.id, UserUpdateRequest { is_admin: Some(true), ..Default::default() })
            .await
            .unwrap_err(),
    );
    forbidden(h.state.users.set_group(as_staff, staff.id, Some(root_group.id)).await.unwrap_err());
    forbidden(h.state.groups.add_user(as_staff, root_group.id, staff.id).await.unwrap_err());
    forbidden(
        h.state
            .groups
            .update(as_staff, staff_group.id, GroupUpdateRequest { is_admin: Some(true), ..Default::default() })
            .await
            .unwrap_err(),
    );
    forbidden(
        h.state
            .groups
            .create(as_staff, GroupCreateRequest { name: "shadow".into(), description: None, is_admin: true })
            .await
            .unwrap_err(),
    );
    assert!(!h.state.checker.is_admin(staff.id).await?);

    // admin accounts are out of reach too
    forbidden(
        h.state
            .users
            .update(as_staff, root.id, UserUpdateRequest { status: Some(UserStatus::Inactive), ..Default::default() })
            .await
            .unwrap_err(),
    );
    forbidden(h.state.users.delete(as_staff, root.id).await.unwrap_err());
    forbidden(h.state.groups.remove_user(as_staff, root_group.id, root.id).await.unwrap_err());
    forbidden(h.state.groups.delete(as_staff, root_group.id).await.unwrap_err());
    assert!(h.state.checker.is_admin(root.id).await?);

    let promoted = h.state.groups.add_user(as_root, root_group.id, staff.id).await?;
    assert_eq!(promoted.group_id, Some(root_group.id));
    assert!(h.state.checker.is_admin(staff.id).await?);
    Ok(())
}
