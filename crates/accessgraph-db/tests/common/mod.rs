//! Behavior every store backend must share. Each backend's test file runs
//! these against its own store.

#![allow(dead_code)]

use accessgraph_core::error::ErrorKind;
use accessgraph_core::models::group::CreateGroup;
use accessgraph_core::models::organization::{CreateOrganization, UpdateOrganization};
use accessgraph_core::models::permission::Permission;
use accessgraph_core::models::policy::{CreatePolicy, CreatePolicyContent, UpdatePolicy};
use accessgraph_core::models::reference::{EntityKind, ReferenceSlot};
use accessgraph_core::models::resource::{CreateAction, CreateResource};
use accessgraph_core::models::role::{CreateRole, UpdateRole};
use accessgraph_core::models::user::CreateUser;
use accessgraph_core::repository::{
    GraphStore, GroupRepository, OrganizationRepository, Pagination, PolicyRepository,
    ReferenceRepository, ResourceRepository, RoleRepository, UserRepository,
};
use uuid::Uuid;

pub async fn new_org<S: GraphStore>(store: &S, name: &str) -> Uuid {
    store
        .organizations()
        .create(CreateOrganization { name: name.into() })
        .await
        .unwrap()
        .id
}

pub async fn new_user<S: GraphStore>(store: &S, org_id: Uuid, identifier: &str) -> Uuid {
    store
        .users()
        .create(CreateUser {
            org_id,
            username: identifier.to_uppercase(),
            identifier: identifier.into(),
            properties: Default::default(),
        })
        .await
        .unwrap()
        .id
}

pub async fn new_group<S: GraphStore>(store: &S, org_id: Uuid, identifier: &str) -> Uuid {
    store
        .groups()
        .create(CreateGroup {
            org_id,
            identifier: identifier.into(),
            name: identifier.into(),
        })
        .await
        .unwrap()
        .id
}

pub async fn new_role<S: GraphStore>(
    store: &S,
    org_id: Uuid,
    identifier: &str,
    permissions: Vec<Permission>,
) -> Uuid {
    store
        .roles()
        .create(CreateRole {
            org_id,
            identifier: identifier.into(),
            name: identifier.into(),
            permissions,
        })
        .await
        .unwrap()
        .id
}

pub async fn organization_lifecycle<S: GraphStore>(store: &S) {
    let orgs = store.organizations();
    let org = orgs
        .create(CreateOrganization {
            name: "Acme".into(),
        })
        .await
        .unwrap();
    assert!(!org.api_key.is_empty());

    let by_key = orgs.get_by_api_key(&org.api_key).await.unwrap();
    assert_eq!(by_key.id, org.id);

    let rotated = orgs.rotate_api_key(org.id).await.unwrap();
    assert_ne!(rotated.api_key, org.api_key);
    assert!(orgs.get_by_api_key(&org.api_key).await.unwrap_err().is_not_found());
    assert_eq!(
        orgs.get_by_api_key(&rotated.api_key).await.unwrap().id,
        org.id
    );

    let renamed = orgs
        .update(
            org.id,
            UpdateOrganization {
                name: Some("Acme Corp".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Acme Corp");

    let page = orgs.list(Pagination::default()).await.unwrap();
    assert!(page.items.iter().any(|o| o.id == org.id));

    orgs.delete(org.id).await.unwrap();
    assert!(orgs.get_by_id(org.id).await.unwrap_err().is_not_found());
    assert!(orgs.delete(org.id).await.unwrap_err().is_not_found());
}

pub async fn organization_delete_removes_owned_entities<S: GraphStore>(store: &S) {
    let org = new_org(store, "Doomed").await;
    let user = new_user(store, org, "alice").await;

    store.organizations().delete(org).await.unwrap();

    let err = store.users().get_by_id(org, user).await.unwrap_err();
    assert!(err.is_not_found());
}

pub async fn identifiers_are_unique_per_organization<S: GraphStore>(store: &S) {
    let org_a = new_org(store, "A").await;
    let org_b = new_org(store, "B").await;

    let alice = new_user(store, org_a, "alice").await;
    let err = store
        .users()
        .create(CreateUser {
            org_id: org_a,
            username: "Alice Again".into(),
            identifier: "alice".into(),
            properties: Default::default(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    // Another organization may reuse the identifier.
    let other = new_user(store, org_b, "alice").await;
    assert_ne!(alice, other);

    let found = store.users().get_by_identifier(org_a, "alice").await.unwrap();
    assert_eq!(found.id, alice);
}

pub async fn organizations_are_isolated<S: GraphStore>(store: &S) {
    let org_a = new_org(store, "A").await;
    let org_b = new_org(store, "B").await;
    let alice = new_user(store, org_a, "alice").await;

    assert!(
        store
            .users()
            .get_by_id(org_b, alice)
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(!store.references().exists(org_b, EntityKind::User, alice).await.unwrap());
    assert_eq!(
        store
            .users()
            .list(org_b, Pagination::default())
            .await
            .unwrap()
            .total,
        0
    );
}

pub async fn update_and_delete<S: GraphStore>(store: &S) {
    let org = new_org(store, "Org").await;
    let role = new_role(store, org, "editor", vec![]).await;

    let updated = store
        .roles()
        .update(
            org,
            role,
            UpdateRole {
                name: Some("Editors".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Editors");
    assert_eq!(updated.identifier, "editor");

    store.roles().delete(org, role).await.unwrap();
    assert!(store.roles().get_by_id(org, role).await.unwrap_err().is_not_found());
    assert!(store.roles().delete(org, role).await.unwrap_err().is_not_found());
}

pub async fn reference_push_and_pull<S: GraphStore>(store: &S) {
    let org = new_org(store, "Org").await;
    let user = new_user(store, org, "alice").await;
    let role = new_role(store, org, "admin", vec![]).await;
    let refs = store.references();

    assert!(refs.push_reference(org, ReferenceSlot::UserRoles, user, role).await.unwrap());
    assert!(!refs.push_reference(org, ReferenceSlot::UserRoles, user, role).await.unwrap());

    let set = refs.get_references(org, ReferenceSlot::UserRoles, user).await.unwrap();
    assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![role]);

    assert!(refs.pull_reference(org, ReferenceSlot::UserRoles, user, role).await.unwrap());
    assert!(!refs.pull_reference(org, ReferenceSlot::UserRoles, user, role).await.unwrap());

    let missing = Uuid::new_v4();
    let err = refs
        .push_reference(org, ReferenceSlot::UserRoles, missing, role)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

pub async fn point_writes_touch_only_their_owner<S: GraphStore>(store: &S) {
    let org = new_org(store, "Org").await;
    let alice = new_user(store, org, "alice").await;
    let bob = new_user(store, org, "bob").await;
    let team = new_group(store, org, "team").await;
    let refs = store.references();

    refs.push_reference(org, ReferenceSlot::GroupUsers, team, alice)
        .await
        .unwrap();
    refs.push_reference(org, ReferenceSlot::UserGroups, alice, team)
        .await
        .unwrap();

    let bob_groups = refs.get_references(org, ReferenceSlot::UserGroups, bob).await.unwrap();
    assert!(bob_groups.is_empty());
    let alice_roles = refs.get_references(org, ReferenceSlot::UserRoles, alice).await.unwrap();
    assert!(alice_roles.is_empty());
    let members = refs.get_references(org, ReferenceSlot::GroupUsers, team).await.unwrap();
    assert_eq!(members.into_iter().collect::<Vec<_>>(), vec![alice]);

    let err = refs
        .get_references(org, ReferenceSlot::GroupUsers, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let err = refs
        .pull_reference(org, ReferenceSlot::UserGroups, Uuid::new_v4(), team)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

pub async fn pull_reference_everywhere<S: GraphStore>(store: &S) {
    let org = new_org(store, "Org").await;
    let alice = new_user(store, org, "alice").await;
    let bob = new_user(store, org, "bob").await;
    let carol = new_user(store, org, "carol").await;
    let role = new_role(store, org, "viewer", vec![]).await;
    let refs = store.references();

    for user in [alice, bob] {
        refs.push_reference(org, ReferenceSlot::UserRoles, user, role)
            .await
            .unwrap();
    }

    let modified = refs
        .pull_reference_everywhere(org, ReferenceSlot::UserRoles, role)
        .await
        .unwrap();
    assert_eq!(modified, 2);

    for user in [alice, bob, carol] {
        let set = refs.get_references(org, ReferenceSlot::UserRoles, user).await.unwrap();
        assert!(set.is_empty());
    }
}

pub async fn role_permissions<S: GraphStore>(store: &S) {
    let org = new_org(store, "Org").await;
    let role = new_role(
        store,
        org,
        "editor",
        vec![
            Permission::new("docs", "read"),
            Permission::new("docs", "write"),
            Permission::new("billing", "read"),
        ],
    )
    .await;
    let other = new_role(store, org, "reader", vec![Permission::new("docs", "read")]).await;
    let roles = store.roles();

    assert!(!roles.add_permission(org, role, Permission::new("docs", "read")).await.unwrap());
    assert!(roles.add_permission(org, role, Permission::new("docs", "admin")).await.unwrap());
    assert!(roles.remove_permission(org, role, &Permission::new("docs", "admin")).await.unwrap());
    assert!(!roles.remove_permission(org, role, &Permission::new("docs", "admin")).await.unwrap());

    let touched = roles
        .remove_permissions_for_action(org, "docs", "write")
        .await
        .unwrap();
    assert_eq!(touched, 1);

    let touched = roles.remove_permissions_for_resource(org, "docs").await.unwrap();
    assert_eq!(touched, 2);

    let role = roles.get_by_id(org, role).await.unwrap();
    assert_eq!(role.permissions, vec![Permission::new("billing", "read")]);
    let other = roles.get_by_id(org, other).await.unwrap();
    assert!(other.permissions.is_empty());
}

pub async fn resource_actions<S: GraphStore>(store: &S) {
    let org = new_org(store, "Org").await;
    let resources = store.resources();
    let resource = resources
        .create(CreateResource {
            org_id: org,
            identifier: "docs".into(),
            name: "Documents".into(),
            actions: vec![CreateAction::new("read", "Read")],
        })
        .await
        .unwrap();
    assert!(resource.has_action("read"));

    let dup = CreateAction::new("read", "Read again").into_action();
    assert!(!resources.add_action(org, resource.id, dup).await.unwrap());
    let write = CreateAction::new("write", "Write").into_action();
    assert!(resources.add_action(org, resource.id, write).await.unwrap());

    assert!(resources.remove_action(org, resource.id, "read").await.unwrap());
    assert!(!resources.remove_action(org, resource.id, "read").await.unwrap());

    let resource = resources.get_by_identifier(org, "docs").await.unwrap();
    let actions: Vec<_> = resource.actions.iter().map(|a| a.identifier.as_str()).collect();
    assert_eq!(actions, vec!["write"]);
}

pub async fn policy_contents<S: GraphStore>(store: &S) {
    let org = new_org(store, "Org").await;
    let policies = store.policies();
    let policy = policies
        .create(CreatePolicy {
            org_id: org,
            identifier: "baseline".into(),
            name: "Baseline".into(),
            active_version: Some("v1".into()),
            contents: vec![CreatePolicyContent::new("v1", "allow read")],
        })
        .await
        .unwrap();
    assert_eq!(policy.active_content().unwrap().document, "allow read");

    let dup = CreatePolicyContent::new("v1", "other").into_content();
    assert!(!policies.add_content(org, policy.id, dup).await.unwrap());
    let v2 = CreatePolicyContent::new("v2", "allow write").into_content();
    let v2_id = v2.id;
    assert!(policies.add_content(org, policy.id, v2).await.unwrap());

    let activated = policies
        .update(
            org,
            policy.id,
            UpdatePolicy {
                name: None,
                active_version: Some(Some("v2".into())),
            },
        )
        .await
        .unwrap();
    assert_eq!(activated.active_version.as_deref(), Some("v2"));

    let cleared = policies
        .update(
            org,
            policy.id,
            UpdatePolicy {
                name: None,
                active_version: Some(None),
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.active_version, None);

    assert!(policies.remove_content(org, policy.id, v2_id).await.unwrap());
    assert!(!policies.remove_content(org, policy.id, v2_id).await.unwrap());
    let policy = policies.get_by_id(org, policy.id).await.unwrap();
    assert_eq!(policy.contents.len(), 1);
}

pub async fn summaries_follow_request_order<S: GraphStore>(store: &S) {
    let org = new_org(store, "Org").await;
    let ops = store
        .groups()
        .create(CreateGroup {
            org_id: org,
            identifier: "ops".into(),
            name: "Operations".into(),
        })
        .await
        .unwrap();
    let dev = store
        .groups()
        .create(CreateGroup {
            org_id: org,
            identifier: "dev".into(),
            name: "Developers".into(),
        })
        .await
        .unwrap();

    let summaries = store
        .references()
        .summaries(org, EntityKind::Group, vec![dev.id, Uuid::new_v4(), ops.id])
        .await
        .unwrap();
    let identifiers: Vec<_> = summaries.iter().map(|s| s.identifier.as_str()).collect();
    assert_eq!(identifiers, vec!["dev", "ops"]);
    assert_eq!(summaries[0].name, "Developers");
    assert_eq!(summaries[0].kind, EntityKind::Group);

    let alice = new_user(store, org, "alice").await;
    let users = store
        .references()
        .summaries(org, EntityKind::User, vec![alice])
        .await
        .unwrap();
    assert_eq!(users[0].name, "ALICE");
}
