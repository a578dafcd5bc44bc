//! Integration tests for cascade deletion.

mod common;

use accessgraph_core::models::permission::Permission;
use accessgraph_core::models::reference::{EntityKind, EntityRef, ReferencePatch, ReferenceSlot};
use accessgraph_core::repository::{GraphStore, ReferenceRepository, UserRepository};
use common::{
    assert_symmetric, docs_resource, new_group, new_org, new_policy, new_role, new_user, service,
};
use uuid::Uuid;

#[tokio::test]
async fn deleting_a_user_strips_it_from_every_neighbour() {
    let service = service();
    let org = new_org(&service).await;
    let user = new_user(&service, org, "alice").await;
    let keep = new_user(&service, org, "bob").await;
    let role = new_role(&service, org, "viewer", vec![]).await;
    let group = new_group(&service, org, "team").await;
    let policy = new_policy(&service, org, "baseline").await;

    for who in [user, keep] {
        service
            .patch_user(
                org,
                who,
                ReferencePatch {
                    added: vec![
                        EntityRef::role(role),
                        EntityRef::group(group),
                        EntityRef::policy(policy),
                    ],
                    removed: vec![],
                },
            )
            .await
            .unwrap();
    }

    service.delete_user(org, user).await.unwrap();
    assert!(service.get_user(org, user).await.unwrap_err().is_not_found());

    let role_view = service.get_role(org, role).await.unwrap();
    let group_view = service.get_group(org, group).await.unwrap();
    let policy_view = service.get_policy(org, policy).await.unwrap();
    for users in [&role_view.users, &group_view.users, &policy_view.users] {
        let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![keep]);
    }

    assert_symmetric(
        service.store(),
        org,
        &[
            (EntityKind::User, keep),
            (EntityKind::Role, role),
            (EntityKind::Group, group),
            (EntityKind::Policy, policy),
        ],
    )
    .await;
}

#[tokio::test]
async fn deleting_a_group_detaches_roles_users_and_policies() {
    let service = service();
    let org = new_org(&service).await;
    let user = new_user(&service, org, "alice").await;
    let role = new_role(&service, org, "viewer", vec![]).await;
    let group = new_group(&service, org, "team").await;
    let policy = new_policy(&service, org, "baseline").await;

    service
        .patch_group(
            org,
            group,
            ReferencePatch {
                added: vec![
                    EntityRef::user(user),
                    EntityRef::role(role),
                    EntityRef::policy(policy),
                ],
                removed: vec![],
            },
        )
        .await
        .unwrap();

    service.delete_group(org, group).await.unwrap();

    assert!(service.get_user(org, user).await.unwrap().groups.is_empty());
    assert!(service.get_role(org, role).await.unwrap().groups.is_empty());
    assert!(service.get_policy(org, policy).await.unwrap().groups.is_empty());
}

#[tokio::test]
async fn deleting_a_resource_revokes_its_permissions() {
    let service = service();
    let org = new_org(&service).await;
    docs_resource(&service, org).await;
    let docs = service
        .get_resource_by_identifier(org, "docs")
        .await
        .unwrap()
        .id;
    let role = new_role(
        &service,
        org,
        "viewer",
        vec![Permission::new("docs", "read"), Permission::new("docs", "write")],
    )
    .await;

    service.delete_resource(org, docs).await.unwrap();

    assert!(service.get_resource(org, docs).await.unwrap_err().is_not_found());
    assert!(service.get_role(org, role).await.unwrap().permissions.is_empty());

    // The identifier is free again, and the old grants do not come back.
    docs_resource(&service, org).await;
    assert!(service.get_role(org, role).await.unwrap().permissions.is_empty());
}

#[tokio::test]
async fn deleting_a_missing_entity_is_not_found() {
    let service = service();
    let org = new_org(&service).await;

    for entity in [
        EntityRef::user(Uuid::new_v4()),
        EntityRef::role(Uuid::new_v4()),
        EntityRef::group(Uuid::new_v4()),
        EntityRef::policy(Uuid::new_v4()),
        EntityRef::new(EntityKind::Resource, Uuid::new_v4()),
    ] {
        let err = service.delete_entity(org, entity).await.unwrap_err();
        assert!(err.is_not_found(), "{entity}: {err:?}");
    }
}

#[tokio::test]
async fn deleting_a_policy_leaves_other_entities_intact() {
    let service = service();
    let org = new_org(&service).await;
    let user = new_user(&service, org, "alice").await;
    let role = new_role(&service, org, "viewer", vec![]).await;
    let policy = new_policy(&service, org, "baseline").await;
    service
        .assign_edge(org, EntityRef::user(user), EntityRef::role(role))
        .await
        .unwrap();
    service
        .assign_edge(org, EntityRef::user(user), EntityRef::policy(policy))
        .await
        .unwrap();

    service.delete_policy(org, policy).await.unwrap();

    let view = service.get_user(org, user).await.unwrap();
    assert!(view.policies.is_empty());
    assert_eq!(view.roles[0].id, role);
}

#[tokio::test]
async fn dangling_references_to_a_vanished_user_are_stripped() {
    let service = service();
    let org = new_org(&service).await;
    let user = new_user(&service, org, "alice").await;
    let role = new_role(&service, org, "viewer", vec![]).await;
    service
        .assign_edge(org, EntityRef::user(user), EntityRef::role(role))
        .await
        .unwrap();

    // Drop the record directly so only the role still points at it.
    service.store().users().delete(org, user).await.unwrap();
    let users = service
        .store()
        .references()
        .get_references(org, ReferenceSlot::RoleUsers, role)
        .await
        .unwrap();
    assert!(users.contains(&user));

    assert!(service.delete_user(org, user).await.unwrap_err().is_not_found());
    let users = service
        .store()
        .references()
        .get_references(org, ReferenceSlot::RoleUsers, role)
        .await
        .unwrap();
    assert!(users.is_empty());
}

#[tokio::test]
async fn deleting_an_organization_removes_its_entities() {
    let service = service();
    let org = new_org(&service).await;
    let other = new_org(&service).await;
    let user = new_user(&service, org, "alice").await;
    let survivor = new_user(&service, other, "alice").await;

    service.delete_organization(org).await.unwrap();

    assert!(service.get_organization(org).await.unwrap_err().is_not_found());
    assert!(service.get_user(org, user).await.unwrap_err().is_not_found());
    assert_eq!(service.get_user(other, survivor).await.unwrap().identifier, "alice");
}
