//! Integration tests for reference, permission, action and content patches.

mod common;

use accessgraph_core::error::GraphError;
use accessgraph_core::models::permission::Permission;
use accessgraph_core::models::policy::{CreatePolicy, CreatePolicyContent, PolicyContentPatch};
use accessgraph_core::models::reference::{EntityKind, EntityRef, ReferencePatch};
use accessgraph_core::models::resource::{CreateAction, ResourceActionPatch};
use accessgraph_core::models::role::RolePermissionPatch;
use common::{
    assert_symmetric, docs_resource, new_group, new_org, new_policy, new_role, new_user, service,
};
use uuid::Uuid;

#[tokio::test]
async fn reference_patch_adds_and_removes_symmetrically() {
    let service = service();
    let org = new_org(&service).await;
    let user = new_user(&service, org, "alice").await;
    let viewer = new_role(&service, org, "viewer", vec![]).await;
    let editor = new_role(&service, org, "editor", vec![]).await;
    let team = new_group(&service, org, "team").await;

    let outcome = service
        .patch_user(
            org,
            user,
            ReferencePatch {
                added: vec![EntityRef::role(viewer), EntityRef::role(editor), EntityRef::group(team)],
                removed: vec![],
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.added.len(), 3);
    assert!(outcome.skipped.is_empty());

    let outcome = service
        .patch_user(
            org,
            user,
            ReferencePatch {
                added: vec![],
                removed: vec![EntityRef::role(editor)],
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.removed, vec![EntityRef::role(editor)]);

    let view = service.get_user(org, user).await.unwrap();
    let roles: Vec<&str> = view.roles.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(roles, vec!["viewer"]);
    assert_eq!(view.groups[0].identifier, "team");

    assert!(service.get_role(org, editor).await.unwrap().users.is_empty());
    assert_symmetric(
        service.store(),
        org,
        &[
            (EntityKind::User, user),
            (EntityKind::Role, viewer),
            (EntityKind::Role, editor),
            (EntityKind::Group, team),
        ],
    )
    .await;
}

#[tokio::test]
async fn reapplying_a_patch_is_a_no_op() {
    let service = service();
    let org = new_org(&service).await;
    let alice = new_user(&service, org, "alice").await;
    let bob = new_user(&service, org, "bob").await;
    let role = new_role(&service, org, "viewer", vec![]).await;

    let patch = ReferencePatch {
        added: vec![EntityRef::user(alice), EntityRef::user(bob)],
        removed: vec![],
    };
    let first = service.patch_role(org, role, patch.clone()).await.unwrap();
    assert_eq!(first.added.len(), 2);

    let before = service.get_role(org, role).await.unwrap();
    let second = service.patch_role(org, role, patch).await.unwrap();
    assert!(second.added.is_empty());
    assert_eq!(second.skipped.len(), 2);
    assert!(!second.changed());

    let after = service.get_role(org, role).await.unwrap();
    assert_eq!(before.users, after.users);
}

#[tokio::test]
async fn removing_an_absent_edge_succeeds_without_change() {
    let service = service();
    let org = new_org(&service).await;
    let user = new_user(&service, org, "alice").await;
    let role = new_role(&service, org, "viewer", vec![]).await;

    let outcome = service
        .patch_user(
            org,
            user,
            ReferencePatch {
                added: vec![],
                removed: vec![EntityRef::role(role)],
            },
        )
        .await
        .unwrap();
    assert!(outcome.removed.is_empty());
    assert_eq!(outcome.skipped, vec![EntityRef::role(role)]);
    assert!(service.get_user(org, user).await.unwrap().roles.is_empty());
}

#[tokio::test]
async fn invalid_entries_reject_the_whole_patch() {
    let service = service();
    let org = new_org(&service).await;
    let user = new_user(&service, org, "alice").await;
    let role = new_role(&service, org, "viewer", vec![]).await;

    // The unknown group is listed after a valid role: nothing is applied.
    let err = service
        .patch_user(
            org,
            user,
            ReferencePatch {
                added: vec![EntityRef::role(role), EntityRef::group(Uuid::new_v4())],
                removed: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidInput { .. }));
    assert!(service.get_user(org, user).await.unwrap().roles.is_empty());

    // Users cannot be linked to users.
    let other = new_user(&service, org, "bob").await;
    let err = service
        .patch_user(
            org,
            user,
            ReferencePatch {
                added: vec![EntityRef::user(other)],
                removed: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidInput { .. }));

    // The same entry on both sides is contradictory.
    let err = service
        .patch_user(
            org,
            user,
            ReferencePatch {
                added: vec![EntityRef::role(role)],
                removed: vec![EntityRef::role(role)],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidInput { .. }));
}

#[tokio::test]
async fn patching_a_missing_target_is_not_found() {
    let service = service();
    let org = new_org(&service).await;
    let err = service
        .patch_group(org, Uuid::new_v4(), ReferencePatch::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn policy_patch_links_users_and_groups() {
    let service = service();
    let org = new_org(&service).await;
    let policy = new_policy(&service, org, "baseline").await;
    let user = new_user(&service, org, "alice").await;
    let group = new_group(&service, org, "team").await;

    let outcome = service
        .patch_policy(
            org,
            policy,
            ReferencePatch {
                added: vec![EntityRef::user(user), EntityRef::group(group)],
                removed: vec![],
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.added.len(), 2);

    assert_eq!(service.get_user(org, user).await.unwrap().policies[0].id, policy);
    assert_eq!(service.get_group(org, group).await.unwrap().policies[0].id, policy);
}

#[tokio::test]
async fn permission_patch_validates_grants() {
    let service = service();
    let org = new_org(&service).await;
    docs_resource(&service, org).await;
    let role = new_role(&service, org, "viewer", vec![]).await;

    let outcome = service
        .patch_role_permissions(
            org,
            role,
            RolePermissionPatch {
                added: vec![Permission::new("docs", "read")],
                removed: vec![],
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.added, vec![Permission::new("docs", "read")]);

    // Granting again is skipped; revoking an ungranted pair is a no-op.
    let outcome = service
        .patch_role_permissions(
            org,
            role,
            RolePermissionPatch {
                added: vec![Permission::new("docs", "read")],
                removed: vec![Permission::new("docs", "write")],
            },
        )
        .await
        .unwrap();
    assert!(!outcome.changed());
    assert_eq!(outcome.skipped.len(), 2);

    for bad in [Permission::new("docs", "delete"), Permission::new("wiki", "read")] {
        let err = service
            .patch_role_permissions(
                org,
                role,
                RolePermissionPatch {
                    added: vec![bad],
                    removed: vec![],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidInput { .. }));
    }

    let outcome = service
        .patch_role_permissions(
            org,
            role,
            RolePermissionPatch {
                added: vec![],
                removed: vec![Permission::new("docs", "read")],
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.removed, vec![Permission::new("docs", "read")]);
    assert!(service.get_role(org, role).await.unwrap().permissions.is_empty());
}

#[tokio::test]
async fn removing_an_action_revokes_its_grants() {
    let service = service();
    let org = new_org(&service).await;
    let docs = docs_resource(&service, org).await;
    let role = new_role(
        &service,
        org,
        "editor",
        vec![Permission::new("docs", "read"), Permission::new("docs", "write")],
    )
    .await;

    let outcome = service
        .patch_resource_actions(
            org,
            docs,
            ResourceActionPatch {
                added: vec![CreateAction::new("share", "Share")],
                removed: vec!["write".into()],
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.added, vec!["share".to_string()]);
    assert_eq!(outcome.removed, vec!["write".to_string()]);

    let resource = service.get_resource(org, docs).await.unwrap();
    let actions: Vec<&str> = resource.actions.iter().map(|a| a.identifier.as_str()).collect();
    assert_eq!(actions, vec!["read", "share"]);

    let role = service.get_role(org, role).await.unwrap();
    assert_eq!(role.permissions, vec![Permission::new("docs", "read")]);

    // Re-adding an existing action is skipped; listing it twice is rejected.
    let outcome = service
        .patch_resource_actions(
            org,
            docs,
            ResourceActionPatch {
                added: vec![CreateAction::new("share", "Share")],
                removed: vec![],
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.skipped, vec!["share".to_string()]);

    let err = service
        .patch_resource_actions(
            org,
            docs,
            ResourceActionPatch {
                added: vec![CreateAction::new("audit", "Audit"), CreateAction::new("audit", "Audit")],
                removed: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidInput { .. }));
}

#[tokio::test]
async fn content_patch_protects_the_active_version() {
    let service = service();
    let org = new_org(&service).await;
    let policy = service
        .create_policy(CreatePolicy {
            org_id: org,
            identifier: "baseline".into(),
            name: "Baseline".into(),
            active_version: Some("v1".into()),
            contents: vec![CreatePolicyContent::new("v1", "allow read")],
        })
        .await
        .unwrap();
    let v1 = policy.contents[0].id;

    let outcome = service
        .patch_policy_contents(
            org,
            policy.id,
            PolicyContentPatch {
                added: vec![
                    CreatePolicyContent::new("v2", "allow read, write"),
                    CreatePolicyContent::new("v1", "ignored"),
                ],
                removed: vec![],
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.added.len(), 1);
    assert_eq!(outcome.skipped, vec![v1]);

    let err = service
        .patch_policy_contents(
            org,
            policy.id,
            PolicyContentPatch {
                added: vec![],
                removed: vec![v1],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidInput { .. }));

    let v2 = outcome.added[0];
    let outcome = service
        .patch_policy_contents(
            org,
            policy.id,
            PolicyContentPatch {
                added: vec![],
                removed: vec![v2, Uuid::new_v4()],
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.removed, vec![v2]);
    assert_eq!(outcome.skipped.len(), 1);

    let view = service.get_policy(org, policy.id).await.unwrap();
    assert_eq!(view.contents.len(), 1);
    assert_eq!(view.contents[0].document, "allow read");
}
