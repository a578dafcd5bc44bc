//! In-memory store backend.
//!
//! One [`OrgDocument`] per organization in a `DashMap`. Every repository
//! call takes the organization's shard lock once, so each call is atomic
//! with respect to every other call on the same organization, and
//! organizations never observe each other.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use accessgraph_core::error::{GraphError, GraphResult};
use accessgraph_core::models::group::{CreateGroup, Group, UpdateGroup};
use accessgraph_core::models::organization::{
    CreateOrganization, Organization, UpdateOrganization,
};
use accessgraph_core::models::permission::Permission;
use accessgraph_core::models::policy::{CreatePolicy, Policy, PolicyContent, UpdatePolicy};
use accessgraph_core::models::reference::{EntityKind, ReferenceSlot};
use accessgraph_core::models::resource::{Action, CreateResource, Resource, UpdateResource};
use accessgraph_core::models::role::{CreateRole, Role, UpdateRole};
use accessgraph_core::models::summary::EntitySummary;
use accessgraph_core::models::user::{CreateUser, UpdateUser, User};
use accessgraph_core::repository::{
    GraphStore, GroupRepository, OrganizationRepository, PaginatedResult, Pagination,
    PolicyRepository, ReferenceRepository, ResourceRepository, RoleRepository, UserRepository,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::instrument;
use uuid::Uuid;

use crate::repository::generate_api_key;

/// Everything one organization owns.
#[derive(Debug, Clone)]
struct OrgDocument {
    organization: Organization,
    resources: HashMap<Uuid, Resource>,
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Role>,
    groups: HashMap<Uuid, Group>,
    policies: HashMap<Uuid, Policy>,
}

impl OrgDocument {
    fn new(organization: Organization) -> Self {
        Self {
            organization,
            resources: HashMap::new(),
            users: HashMap::new(),
            roles: HashMap::new(),
            groups: HashMap::new(),
            policies: HashMap::new(),
        }
    }

    fn contains(&self, kind: EntityKind, id: Uuid) -> bool {
        match kind {
            EntityKind::Resource => self.resources.contains_key(&id),
            EntityKind::User => self.users.contains_key(&id),
            EntityKind::Role => self.roles.contains_key(&id),
            EntityKind::Group => self.groups.contains_key(&id),
            EntityKind::Policy => self.policies.contains_key(&id),
        }
    }

    fn summary(&self, kind: EntityKind, id: Uuid) -> Option<EntitySummary> {
        let (identifier, name) = match kind {
            EntityKind::Resource => self
                .resources
                .get(&id)
                .map(|e| (e.identifier.clone(), e.name.clone())),
            EntityKind::User => self
                .users
                .get(&id)
                .map(|e| (e.identifier.clone(), e.username.clone())),
            EntityKind::Role => self
                .roles
                .get(&id)
                .map(|e| (e.identifier.clone(), e.name.clone())),
            EntityKind::Group => self
                .groups
                .get(&id)
                .map(|e| (e.identifier.clone(), e.name.clone())),
            EntityKind::Policy => self
                .policies
                .get(&id)
                .map(|e| (e.identifier.clone(), e.name.clone())),
        }?;
        Some(EntitySummary {
            id,
            kind,
            identifier,
            name,
        })
    }

    /// Every `(owner id, set, updated_at)` for the slot's owner kind.
    fn slot_sets(
        &mut self,
        slot: ReferenceSlot,
    ) -> Vec<(Uuid, &mut BTreeSet<Uuid>, &mut DateTime<Utc>)> {
        match slot {
            ReferenceSlot::UserRoles => self
                .users
                .values_mut()
                .map(|e| (e.id, &mut e.roles, &mut e.updated_at))
                .collect(),
            ReferenceSlot::UserGroups => self
                .users
                .values_mut()
                .map(|e| (e.id, &mut e.groups, &mut e.updated_at))
                .collect(),
            ReferenceSlot::UserPolicies => self
                .users
                .values_mut()
                .map(|e| (e.id, &mut e.policies, &mut e.updated_at))
                .collect(),
            ReferenceSlot::RoleUsers => self
                .roles
                .values_mut()
                .map(|e| (e.id, &mut e.users, &mut e.updated_at))
                .collect(),
            ReferenceSlot::RoleGroups => self
                .roles
                .values_mut()
                .map(|e| (e.id, &mut e.groups, &mut e.updated_at))
                .collect(),
            ReferenceSlot::GroupUsers => self
                .groups
                .values_mut()
                .map(|e| (e.id, &mut e.users, &mut e.updated_at))
                .collect(),
            ReferenceSlot::GroupRoles => self
                .groups
                .values_mut()
                .map(|e| (e.id, &mut e.roles, &mut e.updated_at))
                .collect(),
            ReferenceSlot::GroupPolicies => self
                .groups
                .values_mut()
                .map(|e| (e.id, &mut e.policies, &mut e.updated_at))
                .collect(),
            ReferenceSlot::PolicyUsers => self
                .policies
                .values_mut()
                .map(|e| (e.id, &mut e.users, &mut e.updated_at))
                .collect(),
            ReferenceSlot::PolicyGroups => self
                .policies
                .values_mut()
                .map(|e| (e.id, &mut e.groups, &mut e.updated_at))
                .collect(),
        }
    }

    /// One owner's set. `None` if the owner is absent.
    fn slot(&self, slot: ReferenceSlot, id: Uuid) -> Option<&BTreeSet<Uuid>> {
        match slot {
            ReferenceSlot::UserRoles => self.users.get(&id).map(|e| &e.roles),
            ReferenceSlot::UserGroups => self.users.get(&id).map(|e| &e.groups),
            ReferenceSlot::UserPolicies => self.users.get(&id).map(|e| &e.policies),
            ReferenceSlot::RoleUsers => self.roles.get(&id).map(|e| &e.users),
            ReferenceSlot::RoleGroups => self.roles.get(&id).map(|e| &e.groups),
            ReferenceSlot::GroupUsers => self.groups.get(&id).map(|e| &e.users),
            ReferenceSlot::GroupRoles => self.groups.get(&id).map(|e| &e.roles),
            ReferenceSlot::GroupPolicies => self.groups.get(&id).map(|e| &e.policies),
            ReferenceSlot::PolicyUsers => self.policies.get(&id).map(|e| &e.users),
            ReferenceSlot::PolicyGroups => self.policies.get(&id).map(|e| &e.groups),
        }
    }

    /// One owner's set and its `updated_at`. `None` if the owner is absent.
    fn slot_mut(
        &mut self,
        slot: ReferenceSlot,
        id: Uuid,
    ) -> Option<(&mut BTreeSet<Uuid>, &mut DateTime<Utc>)> {
        match slot {
            ReferenceSlot::UserRoles => self
                .users
                .get_mut(&id)
                .map(|e| (&mut e.roles, &mut e.updated_at)),
            ReferenceSlot::UserGroups => self
                .users
                .get_mut(&id)
                .map(|e| (&mut e.groups, &mut e.updated_at)),
            ReferenceSlot::UserPolicies => self
                .users
                .get_mut(&id)
                .map(|e| (&mut e.policies, &mut e.updated_at)),
            ReferenceSlot::RoleUsers => self
                .roles
                .get_mut(&id)
                .map(|e| (&mut e.users, &mut e.updated_at)),
            ReferenceSlot::RoleGroups => self
                .roles
                .get_mut(&id)
                .map(|e| (&mut e.groups, &mut e.updated_at)),
            ReferenceSlot::GroupUsers => self
                .groups
                .get_mut(&id)
                .map(|e| (&mut e.users, &mut e.updated_at)),
            ReferenceSlot::GroupRoles => self
                .groups
                .get_mut(&id)
                .map(|e| (&mut e.roles, &mut e.updated_at)),
            ReferenceSlot::GroupPolicies => self
                .groups
                .get_mut(&id)
                .map(|e| (&mut e.policies, &mut e.updated_at)),
            ReferenceSlot::PolicyUsers => self
                .policies
                .get_mut(&id)
                .map(|e| (&mut e.users, &mut e.updated_at)),
            ReferenceSlot::PolicyGroups => self
                .policies
                .get_mut(&id)
                .map(|e| (&mut e.groups, &mut e.updated_at)),
        }
    }

    /// Insert or remove `target` in one owner's set, touching `updated_at`
    /// only on change. `None` if the owner is absent.
    fn toggle_reference(
        &mut self,
        slot: ReferenceSlot,
        id: Uuid,
        target: Uuid,
        insert: bool,
    ) -> Option<bool> {
        let (set, updated_at) = self.slot_mut(slot, id)?;
        let changed = if insert {
            set.insert(target)
        } else {
            set.remove(&target)
        };
        if changed {
            *updated_at = Utc::now();
        }
        Some(changed)
    }
}

/// An organization-scoped entity held in an [`OrgDocument`].
trait Stored: Clone {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;
    fn identifier(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    fn collection(doc: &OrgDocument) -> &HashMap<Uuid, Self>;
    fn collection_mut(doc: &mut OrgDocument) -> &mut HashMap<Uuid, Self>;
}

macro_rules! impl_stored {
    ($ty:ty, $kind:expr, $field:ident) => {
        impl Stored for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> Uuid {
                self.id
            }

            fn identifier(&self) -> &str {
                &self.identifier
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }

            fn collection(doc: &OrgDocument) -> &HashMap<Uuid, Self> {
                &doc.$field
            }

            fn collection_mut(doc: &mut OrgDocument) -> &mut HashMap<Uuid, Self> {
                &mut doc.$field
            }
        }
    };
}

impl_stored!(Resource, EntityKind::Resource, resources);
impl_stored!(User, EntityKind::User, users);
impl_stored!(Role, EntityKind::Role, roles);
impl_stored!(Group, EntityKind::Group, groups);
impl_stored!(Policy, EntityKind::Policy, policies);

#[derive(Debug, Default)]
struct MemoryState {
    orgs: DashMap<Uuid, OrgDocument>,
}

impl MemoryState {
    fn org_missing(org_id: Uuid) -> GraphError {
        GraphError::not_found("organization", org_id)
    }

    fn read<R>(&self, org_id: Uuid, f: impl FnOnce(&OrgDocument) -> R) -> GraphResult<R> {
        let doc = self
            .orgs
            .get(&org_id)
            .ok_or_else(|| Self::org_missing(org_id))?;
        Ok(f(doc.value()))
    }

    fn write<R>(
        &self,
        org_id: Uuid,
        f: impl FnOnce(&mut OrgDocument) -> GraphResult<R>,
    ) -> GraphResult<R> {
        let mut doc = self
            .orgs
            .get_mut(&org_id)
            .ok_or_else(|| Self::org_missing(org_id))?;
        f(doc.value_mut())
    }

    /// Insert a new entity, enforcing identifier uniqueness inside the
    /// same critical section.
    fn insert<E: Stored>(&self, org_id: Uuid, entity: E) -> GraphResult<E> {
        self.write(org_id, |doc| {
            let collection = E::collection_mut(doc);
            if collection
                .values()
                .any(|e| e.identifier() == entity.identifier())
            {
                return Err(GraphError::already_exists(
                    E::KIND.as_str(),
                    entity.identifier(),
                ));
            }
            collection.insert(entity.id(), entity.clone());
            Ok(entity)
        })
    }

    fn get<E: Stored>(&self, org_id: Uuid, id: Uuid) -> GraphResult<E> {
        self.read(org_id, |doc| E::collection(doc).get(&id).cloned())?
            .ok_or_else(|| GraphError::not_found(E::KIND.as_str(), id))
    }

    fn get_by_identifier<E: Stored>(&self, org_id: Uuid, identifier: &str) -> GraphResult<E> {
        self.read(org_id, |doc| {
            E::collection(doc)
                .values()
                .find(|e| e.identifier() == identifier)
                .cloned()
        })?
        .ok_or_else(|| GraphError::not_found(E::KIND.as_str(), identifier))
    }

    fn modify<E: Stored, R>(
        &self,
        org_id: Uuid,
        id: Uuid,
        f: impl FnOnce(&mut E) -> R,
    ) -> GraphResult<R> {
        self.write(org_id, |doc| {
            E::collection_mut(doc)
                .get_mut(&id)
                .map(f)
                .ok_or_else(|| GraphError::not_found(E::KIND.as_str(), id))
        })
    }

    fn remove<E: Stored>(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        self.write(org_id, |doc| {
            E::collection_mut(doc)
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| GraphError::not_found(E::KIND.as_str(), id))
        })
    }

    fn list<E: Stored>(&self, org_id: Uuid, pagination: Pagination) -> GraphResult<PaginatedResult<E>> {
        let mut items: Vec<E> = self.read(org_id, |doc| {
            E::collection(doc).values().cloned().collect()
        })?;
        items.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MemoryOrganizationRepository {
    state: Arc<MemoryState>,
}

#[derive(Debug, Clone)]
pub struct MemoryResourceRepository {
    state: Arc<MemoryState>,
}

#[derive(Debug, Clone)]
pub struct MemoryUserRepository {
    state: Arc<MemoryState>,
}

#[derive(Debug, Clone)]
pub struct MemoryRoleRepository {
    state: Arc<MemoryState>,
}

#[derive(Debug, Clone)]
pub struct MemoryGroupRepository {
    state: Arc<MemoryState>,
}

#[derive(Debug, Clone)]
pub struct MemoryPolicyRepository {
    state: Arc<MemoryState>,
}

#[derive(Debug, Clone)]
pub struct MemoryReferenceRepository {
    state: Arc<MemoryState>,
}

impl OrganizationRepository for MemoryOrganizationRepository {
    #[instrument(skip(self))]
    async fn create(&self, input: CreateOrganization) -> GraphResult<Organization> {
        let now = Utc::now();
        let organization = Organization {
            id: Uuid::new_v4(),
            name: input.name,
            api_key: generate_api_key(),
            created_at: now,
            updated_at: now,
        };
        self.state
            .orgs
            .insert(organization.id, OrgDocument::new(organization.clone()));
        Ok(organization)
    }

    async fn get_by_id(&self, id: Uuid) -> GraphResult<Organization> {
        self.state.read(id, |doc| doc.organization.clone())
    }

    async fn get_by_api_key(&self, api_key: &str) -> GraphResult<Organization> {
        self.state
            .orgs
            .iter()
            .find(|entry| entry.organization.api_key == api_key)
            .map(|entry| entry.organization.clone())
            .ok_or_else(|| GraphError::not_found("organization", "<api key>"))
    }

    async fn update(&self, id: Uuid, input: UpdateOrganization) -> GraphResult<Organization> {
        self.state.write(id, |doc| {
            if let Some(name) = input.name {
                doc.organization.name = name;
            }
            doc.organization.updated_at = Utc::now();
            Ok(doc.organization.clone())
        })
    }

    async fn rotate_api_key(&self, id: Uuid) -> GraphResult<Organization> {
        self.state.write(id, |doc| {
            doc.organization.api_key = generate_api_key();
            doc.organization.updated_at = Utc::now();
            Ok(doc.organization.clone())
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> GraphResult<()> {
        self.state
            .orgs
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| MemoryState::org_missing(id))
    }

    async fn list(&self, pagination: Pagination) -> GraphResult<PaginatedResult<Organization>> {
        let mut items: Vec<Organization> = self
            .state
            .orgs
            .iter()
            .map(|entry| entry.organization.clone())
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

impl ResourceRepository for MemoryResourceRepository {
    async fn create(&self, input: CreateResource) -> GraphResult<Resource> {
        let now = Utc::now();
        let resource = Resource {
            id: Uuid::new_v4(),
            org_id: input.org_id,
            identifier: input.identifier,
            name: input.name,
            actions: input.actions.into_iter().map(|a| a.into_action()).collect(),
            created_at: now,
            updated_at: now,
        };
        self.state.insert(input.org_id, resource)
    }

    async fn get_by_id(&self, org_id: Uuid, id: Uuid) -> GraphResult<Resource> {
        self.state.get(org_id, id)
    }

    async fn get_by_identifier(&self, org_id: Uuid, identifier: &str) -> GraphResult<Resource> {
        self.state.get_by_identifier(org_id, identifier)
    }

    async fn update(
        &self,
        org_id: Uuid,
        id: Uuid,
        input: UpdateResource,
    ) -> GraphResult<Resource> {
        self.state.modify(org_id, id, |resource: &mut Resource| {
            if let Some(name) = input.name {
                resource.name = name;
            }
            resource.updated_at = Utc::now();
            resource.clone()
        })
    }

    async fn delete(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        self.state.remove::<Resource>(org_id, id)
    }

    async fn list(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> GraphResult<PaginatedResult<Resource>> {
        self.state.list(org_id, pagination)
    }

    async fn add_action(&self, org_id: Uuid, id: Uuid, action: Action) -> GraphResult<bool> {
        self.state.modify(org_id, id, |resource: &mut Resource| {
            if resource.has_action(&action.identifier) {
                return false;
            }
            resource.actions.push(action);
            resource.updated_at = Utc::now();
            true
        })
    }

    async fn remove_action(
        &self,
        org_id: Uuid,
        id: Uuid,
        action_identifier: &str,
    ) -> GraphResult<bool> {
        self.state.modify(org_id, id, |resource: &mut Resource| {
            let before = resource.actions.len();
            resource.actions.retain(|a| a.identifier != action_identifier);
            let changed = resource.actions.len() != before;
            if changed {
                resource.updated_at = Utc::now();
            }
            changed
        })
    }
}

impl UserRepository for MemoryUserRepository {
    async fn create(&self, input: CreateUser) -> GraphResult<User> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            org_id: input.org_id,
            username: input.username,
            identifier: input.identifier,
            properties: input.properties,
            roles: BTreeSet::new(),
            groups: BTreeSet::new(),
            policies: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };
        self.state.insert(input.org_id, user)
    }

    async fn get_by_id(&self, org_id: Uuid, id: Uuid) -> GraphResult<User> {
        self.state.get(org_id, id)
    }

    async fn get_by_identifier(&self, org_id: Uuid, identifier: &str) -> GraphResult<User> {
        self.state.get_by_identifier(org_id, identifier)
    }

    async fn update(&self, org_id: Uuid, id: Uuid, input: UpdateUser) -> GraphResult<User> {
        self.state.modify(org_id, id, |user: &mut User| {
            if let Some(username) = input.username {
                user.username = username;
            }
            if let Some(properties) = input.properties {
                user.properties = properties;
            }
            user.updated_at = Utc::now();
            user.clone()
        })
    }

    async fn delete(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        self.state.remove::<User>(org_id, id)
    }

    async fn list(&self, org_id: Uuid, pagination: Pagination) -> GraphResult<PaginatedResult<User>> {
        self.state.list(org_id, pagination)
    }
}

impl RoleRepository for MemoryRoleRepository {
    async fn create(&self, input: CreateRole) -> GraphResult<Role> {
        let now = Utc::now();
        let mut permissions = input.permissions;
        permissions.sort();
        permissions.dedup();
        let role = Role {
            id: Uuid::new_v4(),
            org_id: input.org_id,
            identifier: input.identifier,
            name: input.name,
            users: BTreeSet::new(),
            groups: BTreeSet::new(),
            permissions,
            created_at: now,
            updated_at: now,
        };
        self.state.insert(input.org_id, role)
    }

    async fn get_by_id(&self, org_id: Uuid, id: Uuid) -> GraphResult<Role> {
        self.state.get(org_id, id)
    }

    async fn get_by_identifier(&self, org_id: Uuid, identifier: &str) -> GraphResult<Role> {
        self.state.get_by_identifier(org_id, identifier)
    }

    async fn update(&self, org_id: Uuid, id: Uuid, input: UpdateRole) -> GraphResult<Role> {
        self.state.modify(org_id, id, |role: &mut Role| {
            if let Some(name) = input.name {
                role.name = name;
            }
            role.updated_at = Utc::now();
            role.clone()
        })
    }

    async fn delete(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        self.state.remove::<Role>(org_id, id)
    }

    async fn list(&self, org_id: Uuid, pagination: Pagination) -> GraphResult<PaginatedResult<Role>> {
        self.state.list(org_id, pagination)
    }

    async fn add_permission(
        &self,
        org_id: Uuid,
        id: Uuid,
        permission: Permission,
    ) -> GraphResult<bool> {
        self.state.modify(org_id, id, |role: &mut Role| {
            if role.permissions.contains(&permission) {
                return false;
            }
            role.permissions.push(permission);
            role.updated_at = Utc::now();
            true
        })
    }

    async fn remove_permission(
        &self,
        org_id: Uuid,
        id: Uuid,
        permission: &Permission,
    ) -> GraphResult<bool> {
        self.state.modify(org_id, id, |role: &mut Role| {
            let before = role.permissions.len();
            role.permissions.retain(|p| p != permission);
            let changed = role.permissions.len() != before;
            if changed {
                role.updated_at = Utc::now();
            }
            changed
        })
    }

    async fn remove_permissions_for_resource(
        &self,
        org_id: Uuid,
        resource_identifier: &str,
    ) -> GraphResult<u64> {
        self.state.write(org_id, |doc| {
            Ok(strip_permissions(doc, |p| p.resource == resource_identifier))
        })
    }

    async fn remove_permissions_for_action(
        &self,
        org_id: Uuid,
        resource_identifier: &str,
        action_identifier: &str,
    ) -> GraphResult<u64> {
        self.state.write(org_id, |doc| {
            Ok(strip_permissions(doc, |p| {
                p.matches(resource_identifier, action_identifier)
            }))
        })
    }
}

/// Drop every matching permission from every role; count roles changed.
fn strip_permissions(doc: &mut OrgDocument, matches: impl Fn(&Permission) -> bool) -> u64 {
    let now = Utc::now();
    let mut modified = 0;
    for role in doc.roles.values_mut() {
        let before = role.permissions.len();
        role.permissions.retain(|p| !matches(p));
        if role.permissions.len() != before {
            role.updated_at = now;
            modified += 1;
        }
    }
    modified
}

impl GroupRepository for MemoryGroupRepository {
    async fn create(&self, input: CreateGroup) -> GraphResult<Group> {
        let now = Utc::now();
        let group = Group {
            id: Uuid::new_v4(),
            org_id: input.org_id,
            identifier: input.identifier,
            name: input.name,
            users: BTreeSet::new(),
            roles: BTreeSet::new(),
            policies: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };
        self.state.insert(input.org_id, group)
    }

    async fn get_by_id(&self, org_id: Uuid, id: Uuid) -> GraphResult<Group> {
        self.state.get(org_id, id)
    }

    async fn get_by_identifier(&self, org_id: Uuid, identifier: &str) -> GraphResult<Group> {
        self.state.get_by_identifier(org_id, identifier)
    }

    async fn update(&self, org_id: Uuid, id: Uuid, input: UpdateGroup) -> GraphResult<Group> {
        self.state.modify(org_id, id, |group: &mut Group| {
            if let Some(name) = input.name {
                group.name = name;
            }
            group.updated_at = Utc::now();
            group.clone()
        })
    }

    async fn delete(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        self.state.remove::<Group>(org_id, id)
    }

    async fn list(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> GraphResult<PaginatedResult<Group>> {
        self.state.list(org_id, pagination)
    }
}

impl PolicyRepository for MemoryPolicyRepository {
    async fn create(&self, input: CreatePolicy) -> GraphResult<Policy> {
        let now = Utc::now();
        let policy = Policy {
            id: Uuid::new_v4(),
            org_id: input.org_id,
            identifier: input.identifier,
            name: input.name,
            active_version: input.active_version,
            contents: input
                .contents
                .into_iter()
                .map(|c| c.into_content())
                .collect(),
            users: BTreeSet::new(),
            groups: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };
        self.state.insert(input.org_id, policy)
    }

    async fn get_by_id(&self, org_id: Uuid, id: Uuid) -> GraphResult<Policy> {
        self.state.get(org_id, id)
    }

    async fn get_by_identifier(&self, org_id: Uuid, identifier: &str) -> GraphResult<Policy> {
        self.state.get_by_identifier(org_id, identifier)
    }

    async fn update(&self, org_id: Uuid, id: Uuid, input: UpdatePolicy) -> GraphResult<Policy> {
        self.state.modify(org_id, id, |policy: &mut Policy| {
            if let Some(name) = input.name {
                policy.name = name;
            }
            if let Some(active_version) = input.active_version {
                policy.active_version = active_version;
            }
            policy.updated_at = Utc::now();
            policy.clone()
        })
    }

    async fn delete(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        self.state.remove::<Policy>(org_id, id)
    }

    async fn list(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> GraphResult<PaginatedResult<Policy>> {
        self.state.list(org_id, pagination)
    }

    async fn add_content(
        &self,
        org_id: Uuid,
        id: Uuid,
        content: PolicyContent,
    ) -> GraphResult<bool> {
        self.state.modify(org_id, id, |policy: &mut Policy| {
            if policy.content_by_version(&content.version).is_some() {
                return false;
            }
            policy.contents.push(content);
            policy.updated_at = Utc::now();
            true
        })
    }

    async fn remove_content(&self, org_id: Uuid, id: Uuid, content_id: Uuid) -> GraphResult<bool> {
        self.state.modify(org_id, id, |policy: &mut Policy| {
            let before = policy.contents.len();
            policy.contents.retain(|c| c.id != content_id);
            let changed = policy.contents.len() != before;
            if changed {
                policy.updated_at = Utc::now();
            }
            changed
        })
    }
}

impl ReferenceRepository for MemoryReferenceRepository {
    async fn exists(&self, org_id: Uuid, kind: EntityKind, id: Uuid) -> GraphResult<bool> {
        self.state.read(org_id, |doc| doc.contains(kind, id))
    }

    async fn get_references(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        id: Uuid,
    ) -> GraphResult<BTreeSet<Uuid>> {
        self.state.read(org_id, |doc| {
            doc.slot(slot, id)
                .cloned()
                .ok_or_else(|| GraphError::not_found(slot.owner().as_str(), id))
        })?
    }

    async fn push_reference(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        id: Uuid,
        target: Uuid,
    ) -> GraphResult<bool> {
        self.state.write(org_id, |doc| {
            doc.toggle_reference(slot, id, target, true)
                .ok_or_else(|| GraphError::not_found(slot.owner().as_str(), id))
        })
    }

    async fn pull_reference(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        id: Uuid,
        target: Uuid,
    ) -> GraphResult<bool> {
        self.state.write(org_id, |doc| {
            doc.toggle_reference(slot, id, target, false)
                .ok_or_else(|| GraphError::not_found(slot.owner().as_str(), id))
        })
    }

    async fn pull_reference_everywhere(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        target: Uuid,
    ) -> GraphResult<u64> {
        self.state.write(org_id, |doc| {
            let now = Utc::now();
            let mut modified = 0;
            for (_, set, updated_at) in doc.slot_sets(slot) {
                if set.remove(&target) {
                    *updated_at = now;
                    modified += 1;
                }
            }
            Ok(modified)
        })
    }

    async fn summaries(
        &self,
        org_id: Uuid,
        kind: EntityKind,
        ids: Vec<Uuid>,
    ) -> GraphResult<Vec<EntitySummary>> {
        self.state.read(org_id, |doc| {
            let mut seen = BTreeSet::new();
            ids.into_iter()
                .filter(|id| seen.insert(*id))
                .filter_map(|id| doc.summary(kind, id))
                .collect()
        })
    }
}

/// In-memory [`GraphStore`]. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryGraphStore {
    organizations: MemoryOrganizationRepository,
    resources: MemoryResourceRepository,
    users: MemoryUserRepository,
    roles: MemoryRoleRepository,
    groups: MemoryGroupRepository,
    policies: MemoryPolicyRepository,
    references: MemoryReferenceRepository,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        let state = Arc::new(MemoryState::default());
        Self {
            organizations: MemoryOrganizationRepository {
                state: state.clone(),
            },
            resources: MemoryResourceRepository {
                state: state.clone(),
            },
            users: MemoryUserRepository {
                state: state.clone(),
            },
            roles: MemoryRoleRepository {
                state: state.clone(),
            },
            groups: MemoryGroupRepository {
                state: state.clone(),
            },
            policies: MemoryPolicyRepository {
                state: state.clone(),
            },
            references: MemoryReferenceRepository { state },
        }
    }
}

impl Default for MemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore for MemoryGraphStore {
    type Organizations = MemoryOrganizationRepository;
    type Resources = MemoryResourceRepository;
    type Users = MemoryUserRepository;
    type Roles = MemoryRoleRepository;
    type Groups = MemoryGroupRepository;
    type Policies = MemoryPolicyRepository;
    type References = MemoryReferenceRepository;

    fn organizations(&self) -> &Self::Organizations {
        &self.organizations
    }

    fn resources(&self) -> &Self::Resources {
        &self.resources
    }

    fn users(&self) -> &Self::Users {
        &self.users
    }

    fn roles(&self) -> &Self::Roles {
        &self.roles
    }

    fn groups(&self) -> &Self::Groups {
        &self.groups
    }

    fn policies(&self) -> &Self::Policies {
        &self.policies
    }

    fn references(&self) -> &Self::References {
        &self.references
    }
}
