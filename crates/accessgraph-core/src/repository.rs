//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Every entity-level call takes the
//! owning `org_id` and must never observe or modify another organization's
//! data. Each call is a single atomic store update; nothing here spans
//! more than one document, which is why edge maintenance lives in the
//! engine rather than in the store.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::error::GraphResult;
use crate::models::{
    group::{CreateGroup, Group, UpdateGroup},
    organization::{CreateOrganization, Organization, UpdateOrganization},
    permission::Permission,
    policy::{CreatePolicy, Policy, PolicyContent, UpdatePolicy},
    reference::{EntityKind, ReferenceSlot},
    resource::{Action, CreateResource, Resource, UpdateResource},
    role::{CreateRole, Role, UpdateRole},
    summary::EntitySummary,
    user::{CreateUser, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl<T> PaginatedResult<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

// ---------------------------------------------------------------------------
// Organization (global scope)
// ---------------------------------------------------------------------------

pub trait OrganizationRepository: Send + Sync {
    fn create(
        &self,
        input: CreateOrganization,
    ) -> impl Future<Output = GraphResult<Organization>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = GraphResult<Organization>> + Send;
    fn get_by_api_key(
        &self,
        api_key: &str,
    ) -> impl Future<Output = GraphResult<Organization>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateOrganization,
    ) -> impl Future<Output = GraphResult<Organization>> + Send;
    /// Replace the API key with a freshly generated one.
    fn rotate_api_key(&self, id: Uuid) -> impl Future<Output = GraphResult<Organization>> + Send;
    /// Delete the organization and every entity it owns.
    fn delete(&self, id: Uuid) -> impl Future<Output = GraphResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = GraphResult<PaginatedResult<Organization>>> + Send;
}

// ---------------------------------------------------------------------------
// Organization-scoped entity repositories
// ---------------------------------------------------------------------------

pub trait ResourceRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the identifier is taken.
    fn create(&self, input: CreateResource) -> impl Future<Output = GraphResult<Resource>> + Send;
    fn get_by_id(
        &self,
        org_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = GraphResult<Resource>> + Send;
    fn get_by_identifier(
        &self,
        org_id: Uuid,
        identifier: &str,
    ) -> impl Future<Output = GraphResult<Resource>> + Send;
    fn update(
        &self,
        org_id: Uuid,
        id: Uuid,
        input: UpdateResource,
    ) -> impl Future<Output = GraphResult<Resource>> + Send;
    /// Fails with `NotFound` when nothing was removed.
    fn delete(&self, org_id: Uuid, id: Uuid) -> impl Future<Output = GraphResult<()>> + Send;
    fn list(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = GraphResult<PaginatedResult<Resource>>> + Send;

    /// Append an action. Returns `false` if the action identifier is taken.
    fn add_action(
        &self,
        org_id: Uuid,
        id: Uuid,
        action: Action,
    ) -> impl Future<Output = GraphResult<bool>> + Send;

    /// Remove an action by identifier. Returns `false` if it was absent.
    fn remove_action(
        &self,
        org_id: Uuid,
        id: Uuid,
        action_identifier: &str,
    ) -> impl Future<Output = GraphResult<bool>> + Send;
}

pub trait UserRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the identifier is taken.
    fn create(&self, input: CreateUser) -> impl Future<Output = GraphResult<User>> + Send;
    fn get_by_id(&self, org_id: Uuid, id: Uuid) -> impl Future<Output = GraphResult<User>> + Send;
    fn get_by_identifier(
        &self,
        org_id: Uuid,
        identifier: &str,
    ) -> impl Future<Output = GraphResult<User>> + Send;
    fn update(
        &self,
        org_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = GraphResult<User>> + Send;
    /// Fails with `NotFound` when nothing was removed.
    fn delete(&self, org_id: Uuid, id: Uuid) -> impl Future<Output = GraphResult<()>> + Send;
    fn list(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = GraphResult<PaginatedResult<User>>> + Send;
}

pub trait RoleRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the identifier is taken.
    fn create(&self, input: CreateRole) -> impl Future<Output = GraphResult<Role>> + Send;
    fn get_by_id(&self, org_id: Uuid, id: Uuid) -> impl Future<Output = GraphResult<Role>> + Send;
    fn get_by_identifier(
        &self,
        org_id: Uuid,
        identifier: &str,
    ) -> impl Future<Output = GraphResult<Role>> + Send;
    fn update(
        &self,
        org_id: Uuid,
        id: Uuid,
        input: UpdateRole,
    ) -> impl Future<Output = GraphResult<Role>> + Send;
    /// Fails with `NotFound` when nothing was removed.
    fn delete(&self, org_id: Uuid, id: Uuid) -> impl Future<Output = GraphResult<()>> + Send;
    fn list(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = GraphResult<PaginatedResult<Role>>> + Send;

    /// Append a permission. Returns `false` if it was already present.
    fn add_permission(
        &self,
        org_id: Uuid,
        id: Uuid,
        permission: Permission,
    ) -> impl Future<Output = GraphResult<bool>> + Send;

    /// Remove a permission. Returns `false` if it was absent.
    fn remove_permission(
        &self,
        org_id: Uuid,
        id: Uuid,
        permission: &Permission,
    ) -> impl Future<Output = GraphResult<bool>> + Send;

    /// Strip every permission naming `resource_identifier` from every role
    /// in the organization. Returns the number of roles modified.
    fn remove_permissions_for_resource(
        &self,
        org_id: Uuid,
        resource_identifier: &str,
    ) -> impl Future<Output = GraphResult<u64>> + Send;

    /// Strip one `(resource, action)` pair from every role in the
    /// organization. Returns the number of roles modified.
    fn remove_permissions_for_action(
        &self,
        org_id: Uuid,
        resource_identifier: &str,
        action_identifier: &str,
    ) -> impl Future<Output = GraphResult<u64>> + Send;
}

pub trait GroupRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the identifier is taken.
    fn create(&self, input: CreateGroup) -> impl Future<Output = GraphResult<Group>> + Send;
    fn get_by_id(&self, org_id: Uuid, id: Uuid)
    -> impl Future<Output = GraphResult<Group>> + Send;
    fn get_by_identifier(
        &self,
        org_id: Uuid,
        identifier: &str,
    ) -> impl Future<Output = GraphResult<Group>> + Send;
    fn update(
        &self,
        org_id: Uuid,
        id: Uuid,
        input: UpdateGroup,
    ) -> impl Future<Output = GraphResult<Group>> + Send;
    /// Fails with `NotFound` when nothing was removed.
    fn delete(&self, org_id: Uuid, id: Uuid) -> impl Future<Output = GraphResult<()>> + Send;
    fn list(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = GraphResult<PaginatedResult<Group>>> + Send;
}

pub trait PolicyRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the identifier is taken.
    fn create(&self, input: CreatePolicy) -> impl Future<Output = GraphResult<Policy>> + Send;
    fn get_by_id(
        &self,
        org_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = GraphResult<Policy>> + Send;
    fn get_by_identifier(
        &self,
        org_id: Uuid,
        identifier: &str,
    ) -> impl Future<Output = GraphResult<Policy>> + Send;
    fn update(
        &self,
        org_id: Uuid,
        id: Uuid,
        input: UpdatePolicy,
    ) -> impl Future<Output = GraphResult<Policy>> + Send;
    /// Fails with `NotFound` when nothing was removed.
    fn delete(&self, org_id: Uuid, id: Uuid) -> impl Future<Output = GraphResult<()>> + Send;
    fn list(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = GraphResult<PaginatedResult<Policy>>> + Send;

    /// Append a content version. Returns `false` if the version tag is taken.
    fn add_content(
        &self,
        org_id: Uuid,
        id: Uuid,
        content: PolicyContent,
    ) -> impl Future<Output = GraphResult<bool>> + Send;

    /// Remove a content entry by id. Returns `false` if it was absent.
    fn remove_content(
        &self,
        org_id: Uuid,
        id: Uuid,
        content_id: Uuid,
    ) -> impl Future<Output = GraphResult<bool>> + Send;
}

// ---------------------------------------------------------------------------
// Reference sets (adjacency list primitives)
// ---------------------------------------------------------------------------

pub trait ReferenceRepository: Send + Sync {
    fn exists(
        &self,
        org_id: Uuid,
        kind: EntityKind,
        id: Uuid,
    ) -> impl Future<Output = GraphResult<bool>> + Send;

    /// Read one reference set. Fails with `NotFound` if the owner is absent.
    fn get_references(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        id: Uuid,
    ) -> impl Future<Output = GraphResult<BTreeSet<Uuid>>> + Send;

    /// Atomically add `target` to the owner's set. Returns whether the set
    /// changed. Fails with `NotFound` if the owner is absent.
    fn push_reference(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        id: Uuid,
        target: Uuid,
    ) -> impl Future<Output = GraphResult<bool>> + Send;

    /// Atomically remove `target` from the owner's set. Returns whether the
    /// set changed. Fails with `NotFound` if the owner is absent.
    fn pull_reference(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        id: Uuid,
        target: Uuid,
    ) -> impl Future<Output = GraphResult<bool>> + Send;

    /// Remove `target` from this slot on every member of the owner kind.
    /// Returns the number of documents modified.
    fn pull_reference_everywhere(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        target: Uuid,
    ) -> impl Future<Output = GraphResult<u64>> + Send;

    /// Summaries of the given entities, in the order of `ids`. Ids that no
    /// longer resolve are skipped.
    fn summaries(
        &self,
        org_id: Uuid,
        kind: EntityKind,
        ids: Vec<Uuid>,
    ) -> impl Future<Output = GraphResult<Vec<EntitySummary>>> + Send;
}

/// A complete store backend: one repository per collection plus the
/// reference primitives.
pub trait GraphStore: Send + Sync + 'static {
    type Organizations: OrganizationRepository;
    type Resources: ResourceRepository;
    type Users: UserRepository;
    type Roles: RoleRepository;
    type Groups: GroupRepository;
    type Policies: PolicyRepository;
    type References: ReferenceRepository;

    fn organizations(&self) -> &Self::Organizations;
    fn resources(&self) -> &Self::Resources;
    fn users(&self) -> &Self::Users;
    fn roles(&self) -> &Self::Roles;
    fn groups(&self) -> &Self::Groups;
    fn policies(&self) -> &Self::Policies;
    fn references(&self) -> &Self::References;
}
