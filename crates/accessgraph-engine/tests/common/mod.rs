//! Test doubles and fixtures shared by the engine integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use accessgraph_core::error::{GraphError, GraphResult};
use accessgraph_core::models::group::CreateGroup;
use accessgraph_core::models::organization::CreateOrganization;
use accessgraph_core::models::permission::Permission;
use accessgraph_core::models::policy::CreatePolicy;
use accessgraph_core::models::reference::{EntityKind, ReferenceSlot};
use accessgraph_core::models::resource::{CreateAction, CreateResource};
use accessgraph_core::models::role::CreateRole;
use accessgraph_core::models::summary::EntitySummary;
use accessgraph_core::models::user::CreateUser;
use accessgraph_core::repository::{GraphStore, ReferenceRepository};
use accessgraph_core::tuple::{RelationTuple, TupleEngine, TupleQuery};
use accessgraph_db::MemoryGraphStore;
use accessgraph_engine::{AccessGraphService, EngineConfig, MokaDecisionCache};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Tuple engine double
// ---------------------------------------------------------------------------

/// Exact-match tuple store. Records every check it answers.
#[derive(Clone, Default)]
pub struct FakeTuples {
    tuples: Arc<Mutex<Vec<RelationTuple>>>,
    checks: Arc<Mutex<Vec<RelationTuple>>>,
}

impl FakeTuples {
    pub fn checks(&self) -> usize {
        self.checks.lock().unwrap().len()
    }

    pub fn last_check(&self) -> Option<RelationTuple> {
        self.checks.lock().unwrap().last().cloned()
    }
}

impl TupleEngine for FakeTuples {
    async fn write_tuple(&self, tuple: RelationTuple) -> GraphResult<()> {
        let mut tuples = self.tuples.lock().unwrap();
        if !tuples.contains(&tuple) {
            tuples.push(tuple);
        }
        Ok(())
    }

    async fn check_tuple(&self, tuple: &RelationTuple) -> GraphResult<bool> {
        self.checks.lock().unwrap().push(tuple.clone());
        Ok(self.tuples.lock().unwrap().contains(tuple))
    }

    async fn list_tuples(&self, query: &TupleQuery) -> GraphResult<Vec<RelationTuple>> {
        Ok(self
            .tuples
            .lock()
            .unwrap()
            .iter()
            .filter(|t| query.matches(t))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Fault-injecting store
// ---------------------------------------------------------------------------

/// Fail reference writes on one slot: let `skip` calls through, then fail
/// the next `times` calls with a system error.
#[derive(Debug, Clone, Copy)]
pub struct Fault {
    pub slot: ReferenceSlot,
    pub skip: u32,
    pub times: u32,
}

impl Fault {
    pub fn always(slot: ReferenceSlot) -> Self {
        Self {
            slot,
            skip: 0,
            times: u32::MAX,
        }
    }

    pub fn once(slot: ReferenceSlot) -> Self {
        Self {
            slot,
            skip: 0,
            times: 1,
        }
    }
}

pub struct FlakyReferences {
    inner: MemoryGraphStore,
    faults: Mutex<Vec<Fault>>,
}

impl FlakyReferences {
    fn trip(&self, slot: ReferenceSlot) -> GraphResult<()> {
        let mut faults = self.faults.lock().unwrap();
        if let Some(fault) = faults.iter_mut().find(|f| f.slot == slot) {
            if fault.skip > 0 {
                fault.skip -= 1;
            } else if fault.times > 0 {
                fault.times -= 1;
                return Err(GraphError::System(format!("injected failure on {slot}")));
            }
        }
        Ok(())
    }
}

impl ReferenceRepository for FlakyReferences {
    async fn exists(&self, org_id: Uuid, kind: EntityKind, id: Uuid) -> GraphResult<bool> {
        self.inner.references().exists(org_id, kind, id).await
    }

    async fn get_references(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        id: Uuid,
    ) -> GraphResult<BTreeSet<Uuid>> {
        self.inner.references().get_references(org_id, slot, id).await
    }

    async fn push_reference(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        id: Uuid,
        target: Uuid,
    ) -> GraphResult<bool> {
        self.trip(slot)?;
        self.inner
            .references()
            .push_reference(org_id, slot, id, target)
            .await
    }

    async fn pull_reference(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        id: Uuid,
        target: Uuid,
    ) -> GraphResult<bool> {
        self.trip(slot)?;
        self.inner
            .references()
            .pull_reference(org_id, slot, id, target)
            .await
    }

    async fn pull_reference_everywhere(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        target: Uuid,
    ) -> GraphResult<u64> {
        self.inner
            .references()
            .pull_reference_everywhere(org_id, slot, target)
            .await
    }

    async fn summaries(
        &self,
        org_id: Uuid,
        kind: EntityKind,
        ids: Vec<Uuid>,
    ) -> GraphResult<Vec<EntitySummary>> {
        self.inner.references().summaries(org_id, kind, ids).await
    }
}

/// A memory store whose reference writes fail on demand. Every other
/// repository is the memory store's own.
pub struct FlakyStore {
    inner: MemoryGraphStore,
    references: FlakyReferences,
}

impl FlakyStore {
    /// Wrap `inner`; clones of `inner` keep seeing the same data.
    pub fn new(inner: MemoryGraphStore, faults: Vec<Fault>) -> Self {
        Self {
            references: FlakyReferences {
                inner: inner.clone(),
                faults: Mutex::new(faults),
            },
            inner,
        }
    }
}

impl GraphStore for FlakyStore {
    type Organizations = <MemoryGraphStore as GraphStore>::Organizations;
    type Resources = <MemoryGraphStore as GraphStore>::Resources;
    type Users = <MemoryGraphStore as GraphStore>::Users;
    type Roles = <MemoryGraphStore as GraphStore>::Roles;
    type Groups = <MemoryGraphStore as GraphStore>::Groups;
    type Policies = <MemoryGraphStore as GraphStore>::Policies;
    type References = FlakyReferences;

    fn organizations(&self) -> &Self::Organizations {
        self.inner.organizations()
    }

    fn resources(&self) -> &Self::Resources {
        self.inner.resources()
    }

    fn users(&self) -> &Self::Users {
        self.inner.users()
    }

    fn roles(&self) -> &Self::Roles {
        self.inner.roles()
    }

    fn groups(&self) -> &Self::Groups {
        self.inner.groups()
    }

    fn policies(&self) -> &Self::Policies {
        self.inner.policies()
    }

    fn references(&self) -> &Self::References {
        &self.references
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub type TestService<S = MemoryGraphStore> = AccessGraphService<S, FakeTuples, MokaDecisionCache>;

pub fn test_config() -> EngineConfig {
    EngineConfig {
        edge_retry_backoff_ms: 1,
        ..EngineConfig::default()
    }
}

pub fn service_over<S: GraphStore>(store: S, config: EngineConfig) -> (TestService<S>, FakeTuples) {
    let tuples = FakeTuples::default();
    let cache = MokaDecisionCache::new(&config.cache);
    (
        AccessGraphService::new(store, tuples.clone(), cache, config),
        tuples,
    )
}

pub fn service() -> TestService {
    service_over(MemoryGraphStore::new(), test_config()).0
}

pub async fn new_org<S: GraphStore>(service: &TestService<S>) -> Uuid {
    service
        .create_organization(CreateOrganization {
            name: "Acme".into(),
        })
        .await
        .unwrap()
        .id
}

pub async fn new_user<S: GraphStore>(service: &TestService<S>, org_id: Uuid, identifier: &str) -> Uuid {
    service
        .create_user(CreateUser {
            org_id,
            username: identifier.to_uppercase(),
            identifier: identifier.into(),
            properties: Default::default(),
        })
        .await
        .unwrap()
        .id
}

pub async fn new_group<S: GraphStore>(service: &TestService<S>, org_id: Uuid, identifier: &str) -> Uuid {
    service
        .create_group(CreateGroup {
            org_id,
            identifier: identifier.into(),
            name: identifier.into(),
        })
        .await
        .unwrap()
        .id
}

pub async fn new_role<S: GraphStore>(
    service: &TestService<S>,
    org_id: Uuid,
    identifier: &str,
    permissions: Vec<Permission>,
) -> Uuid {
    service
        .create_role(CreateRole {
            org_id,
            identifier: identifier.into(),
            name: identifier.into(),
            permissions,
        })
        .await
        .unwrap()
        .id
}

pub async fn new_policy<S: GraphStore>(service: &TestService<S>, org_id: Uuid, identifier: &str) -> Uuid {
    service
        .create_policy(CreatePolicy {
            org_id,
            identifier: identifier.into(),
            name: identifier.into(),
            active_version: None,
            contents: Vec::new(),
        })
        .await
        .unwrap()
        .id
}

/// Resource `docs` with actions `read` and `write`.
pub async fn docs_resource<S: GraphStore>(service: &TestService<S>, org_id: Uuid) -> Uuid {
    service
        .create_resource(CreateResource {
            org_id,
            identifier: "docs".into(),
            name: "Documents".into(),
            actions: vec![
                CreateAction::new("read", "Read"),
                CreateAction::new("write", "Write"),
            ],
        })
        .await
        .unwrap()
        .id
}

/// Assert that every reference in the organization has its mirror.
pub async fn assert_symmetric<S: GraphStore>(store: &S, org_id: Uuid, ids: &[(EntityKind, Uuid)]) {
    let references = store.references();
    for &(kind, id) in ids {
        for slot in ReferenceSlot::owned_by(kind) {
            let targets = references.get_references(org_id, slot, id).await.unwrap();
            for target in targets {
                let mirror = references
                    .get_references(org_id, slot.inverse(), target)
                    .await
                    .unwrap();
                assert!(
                    mirror.contains(&id),
                    "{kind}:{id} lists {target} in {slot} but {} does not mirror it",
                    slot.inverse()
                );
            }
        }
    }
}
