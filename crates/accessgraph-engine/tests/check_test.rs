//! Integration tests for permission checks and the decision cache.

mod common;

use accessgraph_core::error::GraphError;
use accessgraph_core::models::permission::Permission;
use accessgraph_core::models::reference::EntityRef;
use accessgraph_core::models::role::RolePermissionPatch;
use accessgraph_core::repository::GraphStore;
use accessgraph_core::tuple::{RelationTuple, Subject, TupleQuery};
use accessgraph_db::{MemoryGraphStore, SurrealGraphStore};
use accessgraph_engine::{CheckRequest, DecisionSource, EngineConfig, InvalidationStrategy};
use common::{
    TestService, docs_resource, new_group, new_org, new_role, new_user, service, service_over,
    test_config,
};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

/// alice holds `viewer` directly; bob holds it through group `team`.
async fn seed<S: GraphStore>(service: &TestService<S>) -> Uuid {
    let org = new_org(service).await;
    docs_resource(service, org).await;
    let viewer = new_role(service, org, "viewer", vec![Permission::new("docs", "read")]).await;
    let alice = new_user(service, org, "alice").await;
    let bob = new_user(service, org, "bob").await;
    let team = new_group(service, org, "team").await;

    service
        .assign_edge(org, EntityRef::user(alice), EntityRef::role(viewer))
        .await
        .unwrap();
    service
        .assign_edge(org, EntityRef::user(bob), EntityRef::group(team))
        .await
        .unwrap();
    service
        .assign_edge(org, EntityRef::group(team), EntityRef::role(viewer))
        .await
        .unwrap();
    org
}

async fn allowed<S: GraphStore>(
    service: &TestService<S>,
    org: Uuid,
    subject: &str,
    action: &str,
) -> bool {
    service
        .check(org, CheckRequest::local(subject, "docs", action))
        .await
        .unwrap()
        .allowed
}

#[tokio::test]
async fn direct_and_group_roles_grant_access() {
    let service = service();
    let org = seed(&service).await;

    assert!(allowed(&service, org, "alice", "read").await);
    assert!(!allowed(&service, org, "alice", "write").await);
    assert!(allowed(&service, org, "bob", "read").await);
    assert!(!allowed(&service, org, "bob", "write").await);
    assert!(!allowed(&service, org, "mallory", "read").await);
}

#[tokio::test]
async fn subject_may_be_a_user_id() {
    let service = service();
    let org = seed(&service).await;
    let alice = service.get_user_by_identifier(org, "alice").await.unwrap();

    assert!(allowed(&service, org, &alice.id.to_string(), "read").await);
}

#[tokio::test]
async fn checks_are_scoped_to_the_organization() {
    let service = service();
    let org = seed(&service).await;
    let other = new_org(&service).await;

    assert!(allowed(&service, org, "alice", "read").await);
    assert!(!allowed(&service, other, "alice", "read").await);
}

#[tokio::test]
async fn unknown_organizations_are_not_found() {
    let service = service();

    let err = service
        .check(Uuid::new_v4(), CheckRequest::local("alice", "docs", "read"))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::NotFound { ref entity, .. } if entity == "organization"));

    let err = service
        .check(Uuid::new_v4(), CheckRequest::relationship("alice", "viewer", "doc-1"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn deleted_organizations_stop_answering_checks() {
    let service = service();
    let org = seed(&service).await;
    assert!(allowed(&service, org, "alice", "read").await);

    service.delete_organization(org).await.unwrap();

    // A cached allow from before the delete must not be served either.
    let err = service
        .check(org, CheckRequest::local("alice", "docs", "read"))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::NotFound { ref entity, .. } if entity == "organization"));
}

#[tokio::test]
async fn blank_fields_are_invalid_input() {
    let service = service();
    let org = new_org(&service).await;

    let err = service
        .check(org, CheckRequest::local("alice", " ", "read"))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidInput { .. }));
}

#[tokio::test]
async fn repeated_checks_are_served_from_cache() {
    let service = service();
    let org = seed(&service).await;

    let first = service
        .check(org, CheckRequest::local("alice", "docs", "read"))
        .await
        .unwrap();
    assert_eq!(first.source, DecisionSource::Local);

    let second = service
        .check(org, CheckRequest::local("alice", "docs", "read"))
        .await
        .unwrap();
    assert_eq!(second.source, DecisionSource::Cache);
    assert!(second.allowed);
}

#[tokio::test]
async fn mutations_invalidate_cached_decisions() {
    let service = service();
    let org = seed(&service).await;
    let viewer = service.get_role_by_identifier(org, "viewer").await.unwrap().id;

    assert!(!allowed(&service, org, "alice", "write").await);

    // A no-op mutation keeps the cache warm.
    let alice = service.get_user_by_identifier(org, "alice").await.unwrap().id;
    assert!(
        !service
            .assign_edge(org, EntityRef::user(alice), EntityRef::role(viewer))
            .await
            .unwrap()
    );
    let outcome = service
        .check(org, CheckRequest::local("alice", "docs", "write"))
        .await
        .unwrap();
    assert_eq!(outcome.source, DecisionSource::Cache);

    service
        .patch_role_permissions(
            org,
            viewer,
            RolePermissionPatch {
                added: vec![Permission::new("docs", "write")],
                removed: vec![],
            },
        )
        .await
        .unwrap();

    let outcome = service
        .check(org, CheckRequest::local("alice", "docs", "write"))
        .await
        .unwrap();
    assert_eq!(outcome.source, DecisionSource::Local);
    assert!(outcome.allowed);
}

#[tokio::test]
async fn removing_a_group_edge_revokes_inherited_access() {
    let service = service();
    let org = seed(&service).await;
    let bob = service.get_user_by_identifier(org, "bob").await.unwrap().id;
    let team = service.get_group_by_identifier(org, "team").await.unwrap().id;

    assert!(allowed(&service, org, "bob", "read").await);
    service
        .unassign_edge(org, EntityRef::user(bob), EntityRef::group(team))
        .await
        .unwrap();
    assert!(!allowed(&service, org, "bob", "read").await);
}

#[tokio::test]
async fn mutations_in_one_organization_keep_others_cached() {
    let service = service();
    let acme = seed(&service).await;
    let other = seed(&service).await;

    allowed(&service, acme, "alice", "read").await;
    allowed(&service, other, "alice", "read").await;

    new_user(&service, acme, "carol").await;

    let acme_outcome = service
        .check(acme, CheckRequest::local("alice", "docs", "read"))
        .await
        .unwrap();
    let other_outcome = service
        .check(other, CheckRequest::local("alice", "docs", "read"))
        .await
        .unwrap();
    assert_eq!(acme_outcome.source, DecisionSource::Local);
    assert_eq!(other_outcome.source, DecisionSource::Cache);
}

#[tokio::test]
async fn flush_all_strategy_drops_every_organization() {
    let mut config = test_config();
    config.cache.invalidation = InvalidationStrategy::FlushAll;
    let (service, _) = service_over(MemoryGraphStore::new(), config);
    let acme = seed(&service).await;
    let other = seed(&service).await;

    allowed(&service, other, "alice", "read").await;
    new_user(&service, acme, "carol").await;

    let outcome = service
        .check(other, CheckRequest::local("alice", "docs", "read"))
        .await
        .unwrap();
    assert_eq!(outcome.source, DecisionSource::Local);
}

#[tokio::test]
async fn disabled_cache_always_resolves_live() {
    let mut config = test_config();
    config.cache.enabled = false;
    let (service, _) = service_over(MemoryGraphStore::new(), config);
    let org = seed(&service).await;

    for _ in 0..2 {
        let outcome = service
            .check(org, CheckRequest::local("alice", "docs", "read"))
            .await
            .unwrap();
        assert_eq!(outcome.source, DecisionSource::Local);
    }
}

#[tokio::test]
async fn relationship_checks_delegate_to_the_tuple_engine() {
    let (service, tuples) = service_over(MemoryGraphStore::new(), test_config());
    let org = new_org(&service).await;

    service
        .write_relation(RelationTuple::new(
            "default",
            "doc-1",
            "viewer",
            Subject::Id("alice".into()),
        ))
        .await
        .unwrap();

    let outcome = service
        .check(org, CheckRequest::relationship("alice", "viewer", "doc-1"))
        .await
        .unwrap();
    assert!(outcome.allowed);
    assert_eq!(outcome.source, DecisionSource::Relationship);
    assert_eq!(tuples.last_check().unwrap().namespace, "default");

    // Same question again: answered from cache, engine not consulted.
    let outcome = service
        .check(org, CheckRequest::relationship("alice", "viewer", "doc-1"))
        .await
        .unwrap();
    assert_eq!(outcome.source, DecisionSource::Cache);
    assert_eq!(tuples.checks(), 1);

    let denied = service
        .check(org, CheckRequest::relationship("bob", "viewer", "doc-1"))
        .await
        .unwrap();
    assert!(!denied.allowed);
}

#[tokio::test]
async fn subject_sets_and_explicit_namespaces_are_passed_through() {
    let (service, tuples) = service_over(MemoryGraphStore::new(), test_config());
    let org = new_org(&service).await;

    let request = CheckRequest::Relationship {
        namespace: Some("files".into()),
        subject: "groups:eng#member".into(),
        relation: "owner".into(),
        object: "report".into(),
    };
    service.check(org, request).await.unwrap();

    let seen = tuples.last_check().unwrap();
    assert_eq!(seen.namespace, "files");
    assert_eq!(
        seen.subject,
        Subject::Set {
            namespace: "groups".into(),
            object: "eng".into(),
            relation: "member".into(),
        }
    );
}

#[tokio::test]
async fn writing_a_relation_flushes_cached_denials() {
    let (service, tuples) = service_over(MemoryGraphStore::new(), test_config());
    let org = new_org(&service).await;
    let request = || CheckRequest::relationship("alice", "editor", "doc-1");

    assert!(!service.check(org, request()).await.unwrap().allowed);

    let tuple = RelationTuple::new("default", "doc-1", "editor", Subject::Id("alice".into()));
    service.write_relation(tuple.clone()).await.unwrap();

    let outcome = service.check(org, request()).await.unwrap();
    assert!(outcome.allowed);
    assert_eq!(outcome.source, DecisionSource::Relationship);
    assert_eq!(tuples.checks(), 2);

    let listed = service
        .list_relations(TupleQuery {
            object: Some("doc-1".into()),
            ..TupleQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(listed, vec![tuple]);
}

#[tokio::test]
async fn checks_by_api_key_resolve_the_organization() {
    let service = service();
    let org = seed(&service).await;
    let key = service.get_organization(org).await.unwrap().api_key;

    let outcome = service
        .check_with_key(&key, CheckRequest::local("alice", "docs", "read"))
        .await
        .unwrap();
    assert!(outcome.allowed);

    let err = service
        .check_with_key("not-a-key", CheckRequest::local("alice", "docs", "read"))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::Unauthorized { .. }));
}

#[tokio::test]
async fn rotated_keys_stop_resolving() {
    let service = service();
    let org = seed(&service).await;
    let old = service.get_organization(org).await.unwrap().api_key;

    let rotated = service.rotate_api_key(org).await.unwrap();
    assert_ne!(rotated.api_key, old);

    let err = service
        .check_with_key(&old, CheckRequest::local("alice", "docs", "read"))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::Unauthorized { .. }));
    assert!(
        service
            .check_with_key(&rotated.api_key, CheckRequest::local("alice", "docs", "read"))
            .await
            .unwrap()
            .allowed
    );
}

#[tokio::test]
async fn local_checks_over_surrealdb() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    accessgraph_db::run_migrations(&db).await.unwrap();
    let (service, _) = service_over(SurrealGraphStore::new(db), EngineConfig::default());
    let org = seed(&service).await;

    assert!(allowed(&service, org, "alice", "read").await);
    assert!(allowed(&service, org, "bob", "read").await);
    assert!(!allowed(&service, org, "bob", "write").await);

    let team = service.get_group_by_identifier(org, "team").await.unwrap().id;
    service.delete_group(org, team).await.unwrap();
    assert!(!allowed(&service, org, "bob", "read").await);
    assert!(allowed(&service, org, "alice", "read").await);
}
