//! Command surface over the tenant authorization graph.
//!
//! [`AccessGraphService`] is what a transport layer calls: one method per
//! create, get, list, update, patch and delete of each entity kind, plus
//! organization lifecycle, edge assignment, permission checks and the
//! relationship-tuple pass-through. It validates requests, delegates to the
//! link, patch, cascade and check engines, renders views, and advances the
//! decision cache after every mutation.
//!
//! Generic over the store, tuple engine and cache so that this layer has no
//! dependency on the database crate.

use std::collections::HashSet;
use std::sync::Arc;

use accessgraph_core::cache::DecisionCache;
use accessgraph_core::error::{GraphError, GraphResult};
use accessgraph_core::models::group::{CreateGroup, UpdateGroup};
use accessgraph_core::models::organization::{
    CreateOrganization, Organization, UpdateOrganization,
};
use accessgraph_core::models::permission::Permission;
use accessgraph_core::models::policy::{CreatePolicy, PolicyContentPatch, UpdatePolicy};
use accessgraph_core::models::reference::{EntityKind, EntityRef, ReferencePatch};
use accessgraph_core::models::resource::{CreateResource, ResourceActionPatch, UpdateResource};
use accessgraph_core::models::role::{CreateRole, RolePermissionPatch, UpdateRole};
use accessgraph_core::models::user::{CreateUser, UpdateUser};
use accessgraph_core::repository::{
    GraphStore, GroupRepository, OrganizationRepository, PaginatedResult, Pagination,
    PolicyRepository, ResourceRepository, RoleRepository, UserRepository,
};
use accessgraph_core::tuple::{RelationTuple, TupleEngine, TupleQuery};
use accessgraph_core::validation::{validate_identifier, validate_name};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::cache::Generations;
use crate::cascade::CascadeEngine;
use crate::check::{CheckEngine, CheckOutcome, CheckRequest};
use crate::config::EngineConfig;
use crate::deadline::within;
use crate::link::LinkEngine;
use crate::patch::{PatchEngine, PatchOutcome};
use crate::projection::{GroupView, PolicyView, Projector, ResourceView, RoleView, UserView};

/// Reject a list whose keys repeat.
fn ensure_unique<'a>(label: &str, keys: impl Iterator<Item = &'a str>) -> GraphResult<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(GraphError::invalid_input(format!("{label} {key} is listed twice")));
        }
    }
    Ok(())
}

/// The authorization graph service.
pub struct AccessGraphService<S, T, C> {
    store: Arc<S>,
    tuples: Arc<T>,
    link: LinkEngine<S>,
    patch: PatchEngine<S>,
    cascade: CascadeEngine<S>,
    checker: CheckEngine<S, T, C>,
    projector: Projector<S>,
    config: EngineConfig,
}

impl<S, T, C> AccessGraphService<S, T, C>
where
    S: GraphStore,
    T: TupleEngine,
    C: DecisionCache,
{
    pub fn new(store: S, tuples: T, cache: C, config: EngineConfig) -> Self {
        let store = Arc::new(store);
        let tuples = Arc::new(tuples);
        let link = LinkEngine::new(store.clone(), config.clone());
        Self {
            patch: PatchEngine::new(store.clone(), link.clone(), config.clone()),
            cascade: CascadeEngine::new(store.clone(), config.clone()),
            checker: CheckEngine::new(
                store.clone(),
                tuples.clone(),
                Arc::new(cache),
                Arc::new(Generations::new()),
                config.clone(),
            ),
            projector: Projector::new(store.clone(), config.clone()),
            link,
            store,
            tuples,
            config,
        }
    }

    /// The underlying store, for callers that need raw repository access.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Advance the decision cache when a mutation may have written.
    ///
    /// Request errors (`InvalidInput`, `NotFound`, `AlreadyExists`) are
    /// raised before any write, or after a compensated one; system errors
    /// may leave a partial write behind.
    async fn settle<R>(
        &self,
        org_id: Uuid,
        result: GraphResult<R>,
        changed: impl FnOnce(&R) -> bool,
    ) -> GraphResult<R> {
        let invalidate = match &result {
            Ok(value) => changed(value),
            Err(e) => e.is_retryable(),
        };
        if invalidate {
            self.checker.invalidate(org_id).await;
        }
        result
    }

    async fn ensure_organization(&self, org_id: Uuid) -> GraphResult<()> {
        within(
            self.config.store_timeout(),
            "organization.get",
            self.store.organizations().get_by_id(org_id),
        )
        .await
        .map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Organizations
    // -----------------------------------------------------------------------

    #[instrument(skip(self, input))]
    pub async fn create_organization(&self, input: CreateOrganization) -> GraphResult<Organization> {
        validate_name("organization", &input.name)?;
        let org = within(
            self.config.store_timeout(),
            "organization.create",
            self.store.organizations().create(input),
        )
        .await?;
        info!(org_id = %org.id, "Organization created");
        Ok(org)
    }

    pub async fn get_organization(&self, org_id: Uuid) -> GraphResult<Organization> {
        within(
            self.config.store_timeout(),
            "organization.get",
            self.store.organizations().get_by_id(org_id),
        )
        .await
    }

    pub async fn get_organization_by_api_key(&self, api_key: &str) -> GraphResult<Organization> {
        within(
            self.config.store_timeout(),
            "organization.get_by_api_key",
            self.store.organizations().get_by_api_key(api_key),
        )
        .await
    }

    pub async fn list_organizations(
        &self,
        pagination: Pagination,
    ) -> GraphResult<PaginatedResult<Organization>> {
        within(
            self.config.store_timeout(),
            "organization.list",
            self.store.organizations().list(pagination),
        )
        .await
    }

    pub async fn update_organization(
        &self,
        org_id: Uuid,
        input: UpdateOrganization,
    ) -> GraphResult<Organization> {
        if let Some(name) = &input.name {
            validate_name("organization", name)?;
        }
        within(
            self.config.store_timeout(),
            "organization.update",
            self.store.organizations().update(org_id, input),
        )
        .await
    }

    /// Issue a new API key. Decisions cached under the old key become
    /// unreachable.
    #[instrument(skip(self))]
    pub async fn rotate_api_key(&self, org_id: Uuid) -> GraphResult<Organization> {
        let result = within(
            self.config.store_timeout(),
            "organization.rotate_api_key",
            self.store.organizations().rotate_api_key(org_id),
        )
        .await;
        let org = self.settle(org_id, result, |_| true).await?;
        info!("API key rotated");
        Ok(org)
    }

    /// Delete the organization and everything it owns.
    #[instrument(skip(self))]
    pub async fn delete_organization(&self, org_id: Uuid) -> GraphResult<()> {
        within(
            self.config.store_timeout(),
            "organization.delete",
            self.store.organizations().delete(org_id),
        )
        .await?;
        self.checker.forget(org_id).await;
        info!("Organization deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    #[instrument(skip(self, input), fields(org_id = %input.org_id, identifier = %input.identifier))]
    pub async fn create_resource(&self, input: CreateResource) -> GraphResult<ResourceView> {
        validate_identifier("resource", &input.identifier)?;
        validate_name("resource", &input.name)?;
        for action in &input.actions {
            validate_identifier("action", &action.identifier)?;
            validate_name("action", &action.name)?;
        }
        ensure_unique(
            "action",
            input.actions.iter().map(|a| a.identifier.as_str()),
        )?;
        self.ensure_organization(input.org_id).await?;

        let org_id = input.org_id;
        let result = within(
            self.config.store_timeout(),
            "resource.create",
            self.store.resources().create(input),
        )
        .await;
        let resource = self.settle(org_id, result, |_| true).await?;
        info!(resource_id = %resource.id, "Resource created");
        Ok(resource.into())
    }

    pub async fn get_resource(&self, org_id: Uuid, id: Uuid) -> GraphResult<ResourceView> {
        within(
            self.config.store_timeout(),
            "resource.get",
            self.store.resources().get_by_id(org_id, id),
        )
        .await
        .map(ResourceView::from)
    }

    pub async fn get_resource_by_identifier(
        &self,
        org_id: Uuid,
        identifier: &str,
    ) -> GraphResult<ResourceView> {
        within(
            self.config.store_timeout(),
            "resource.get",
            self.store.resources().get_by_identifier(org_id, identifier),
        )
        .await
        .map(ResourceView::from)
    }

    pub async fn list_resources(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> GraphResult<PaginatedResult<ResourceView>> {
        within(
            self.config.store_timeout(),
            "resource.list",
            self.store.resources().list(org_id, pagination),
        )
        .await
        .map(|page| page.map(ResourceView::from))
    }

    pub async fn update_resource(
        &self,
        org_id: Uuid,
        id: Uuid,
        input: UpdateResource,
    ) -> GraphResult<ResourceView> {
        if let Some(name) = &input.name {
            validate_name("resource", name)?;
        }
        within(
            self.config.store_timeout(),
            "resource.update",
            self.store.resources().update(org_id, id, input),
        )
        .await
        .map(ResourceView::from)
    }

    pub async fn patch_resource_actions(
        &self,
        org_id: Uuid,
        id: Uuid,
        patch: ResourceActionPatch,
    ) -> GraphResult<PatchOutcome<String>> {
        let result = self.patch.apply_actions(org_id, id, patch).await;
        self.settle(org_id, result, PatchOutcome::changed).await
    }

    /// Delete a resource and revoke every role permission on it.
    pub async fn delete_resource(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        let result = self
            .cascade
            .delete_entity(org_id, EntityRef::new(EntityKind::Resource, id))
            .await;
        self.settle(org_id, result, |_| true).await
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    #[instrument(skip(self, input), fields(org_id = %input.org_id, identifier = %input.identifier))]
    pub async fn create_user(&self, input: CreateUser) -> GraphResult<UserView> {
        validate_identifier("user", &input.identifier)?;
        validate_name("user", &input.username)?;
        self.ensure_organization(input.org_id).await?;

        let org_id = input.org_id;
        let result = within(
            self.config.store_timeout(),
            "user.create",
            self.store.users().create(input),
        )
        .await;
        let user = self.settle(org_id, result, |_| true).await?;
        info!(user_id = %user.id, "User created");
        self.projector.user(user).await
    }

    pub async fn get_user(&self, org_id: Uuid, id: Uuid) -> GraphResult<UserView> {
        let user = within(
            self.config.store_timeout(),
            "user.get",
            self.store.users().get_by_id(org_id, id),
        )
        .await?;
        self.projector.user(user).await
    }

    pub async fn get_user_by_identifier(
        &self,
        org_id: Uuid,
        identifier: &str,
    ) -> GraphResult<UserView> {
        let user = within(
            self.config.store_timeout(),
            "user.get",
            self.store.users().get_by_identifier(org_id, identifier),
        )
        .await?;
        self.projector.user(user).await
    }

    pub async fn list_users(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> GraphResult<PaginatedResult<UserView>> {
        let page = within(
            self.config.store_timeout(),
            "user.list",
            self.store.users().list(org_id, pagination),
        )
        .await?;
        let mut items = Vec::with_capacity(page.items.len());
        for user in page.items {
            items.push(self.projector.user(user).await?);
        }
        Ok(PaginatedResult {
            items,
            total: page.total,
            offset: page.offset,
            limit: page.limit,
        })
    }

    pub async fn update_user(
        &self,
        org_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> GraphResult<UserView> {
        if let Some(username) = &input.username {
            validate_name("user", username)?;
        }
        let user = within(
            self.config.store_timeout(),
            "user.update",
            self.store.users().update(org_id, id, input),
        )
        .await?;
        self.projector.user(user).await
    }

    /// Link the user to, or unlink it from, roles, groups and policies.
    pub async fn patch_user(
        &self,
        org_id: Uuid,
        id: Uuid,
        patch: ReferencePatch,
    ) -> GraphResult<PatchOutcome<EntityRef>> {
        self.patch_references(org_id, EntityRef::user(id), patch)
            .await
    }

    pub async fn delete_user(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        self.delete_entity(org_id, EntityRef::user(id)).await
    }

    // -----------------------------------------------------------------------
    // Roles
    // -----------------------------------------------------------------------

    /// Create a role. Initial permissions must name existing resources and
    /// actions.
    #[instrument(skip(self, input), fields(org_id = %input.org_id, identifier = %input.identifier))]
    pub async fn create_role(&self, mut input: CreateRole) -> GraphResult<RoleView> {
        validate_identifier("role", &input.identifier)?;
        validate_name("role", &input.name)?;
        self.ensure_organization(input.org_id).await?;

        let mut seen = HashSet::new();
        input.permissions.retain(|p: &Permission| seen.insert(p.clone()));
        self.patch
            .validate_grants(input.org_id, &input.permissions)
            .await?;

        let org_id = input.org_id;
        let result = within(
            self.config.store_timeout(),
            "role.create",
            self.store.roles().create(input),
        )
        .await;
        let role = self.settle(org_id, result, |_| true).await?;
        info!(role_id = %role.id, "Role created");
        self.projector.role(role).await
    }

    pub async fn get_role(&self, org_id: Uuid, id: Uuid) -> GraphResult<RoleView> {
        let role = within(
            self.config.store_timeout(),
            "role.get",
            self.store.roles().get_by_id(org_id, id),
        )
        .await?;
        self.projector.role(role).await
    }

    pub async fn get_role_by_identifier(
        &self,
        org_id: Uuid,
        identifier: &str,
    ) -> GraphResult<RoleView> {
        let role = within(
            self.config.store_timeout(),
            "role.get",
            self.store.roles().get_by_identifier(org_id, identifier),
        )
        .await?;
        self.projector.role(role).await
    }

    pub async fn list_roles(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> GraphResult<PaginatedResult<RoleView>> {
        let page = within(
            self.config.store_timeout(),
            "role.list",
            self.store.roles().list(org_id, pagination),
        )
        .await?;
        let mut items = Vec::with_capacity(page.items.len());
        for role in page.items {
            items.push(self.projector.role(role).await?);
        }
        Ok(PaginatedResult {
            items,
            total: page.total,
            offset: page.offset,
            limit: page.limit,
        })
    }

    pub async fn update_role(
        &self,
        org_id: Uuid,
        id: Uuid,
        input: UpdateRole,
    ) -> GraphResult<RoleView> {
        if let Some(name) = &input.name {
            validate_name("role", name)?;
        }
        let role = within(
            self.config.store_timeout(),
            "role.update",
            self.store.roles().update(org_id, id, input),
        )
        .await?;
        self.projector.role(role).await
    }

    /// Link the role to, or unlink it from, users and groups.
    pub async fn patch_role(
        &self,
        org_id: Uuid,
        id: Uuid,
        patch: ReferencePatch,
    ) -> GraphResult<PatchOutcome<EntityRef>> {
        self.patch_references(org_id, EntityRef::role(id), patch)
            .await
    }

    pub async fn patch_role_permissions(
        &self,
        org_id: Uuid,
        id: Uuid,
        patch: RolePermissionPatch,
    ) -> GraphResult<PatchOutcome<Permission>> {
        let result = self.patch.apply_permissions(org_id, id, patch).await;
        self.settle(org_id, result, PatchOutcome::changed).await
    }

    pub async fn delete_role(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        self.delete_entity(org_id, EntityRef::role(id)).await
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    #[instrument(skip(self, input), fields(org_id = %input.org_id, identifier = %input.identifier))]
    pub async fn create_group(&self, input: CreateGroup) -> GraphResult<GroupView> {
        validate_identifier("group", &input.identifier)?;
        validate_name("group", &input.name)?;
        self.ensure_organization(input.org_id).await?;

        let org_id = input.org_id;
        let result = within(
            self.config.store_timeout(),
            "group.create",
            self.store.groups().create(input),
        )
        .await;
        let group = self.settle(org_id, result, |_| true).await?;
        info!(group_id = %group.id, "Group created");
        self.projector.group(group).await
    }

    pub async fn get_group(&self, org_id: Uuid, id: Uuid) -> GraphResult<GroupView> {
        let group = within(
            self.config.store_timeout(),
            "group.get",
            self.store.groups().get_by_id(org_id, id),
        )
        .await?;
        self.projector.group(group).await
    }

    pub async fn get_group_by_identifier(
        &self,
        org_id: Uuid,
        identifier: &str,
    ) -> GraphResult<GroupView> {
        let group = within(
            self.config.store_timeout(),
            "group.get",
            self.store.groups().get_by_identifier(org_id, identifier),
        )
        .await?;
        self.projector.group(group).await
    }

    pub async fn list_groups(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> GraphResult<PaginatedResult<GroupView>> {
        let page = within(
            self.config.store_timeout(),
            "group.list",
            self.store.groups().list(org_id, pagination),
        )
        .await?;
        let mut items = Vec::with_capacity(page.items.len());
        for group in page.items {
            items.push(self.projector.group(group).await?);
        }
        Ok(PaginatedResult {
            items,
            total: page.total,
            offset: page.offset,
            limit: page.limit,
        })
    }

    pub async fn update_group(
        &self,
        org_id: Uuid,
        id: Uuid,
        input: UpdateGroup,
    ) -> GraphResult<GroupView> {
        if let Some(name) = &input.name {
            validate_name("group", name)?;
        }
        let group = within(
            self.config.store_timeout(),
            "group.update",
            self.store.groups().update(org_id, id, input),
        )
        .await?;
        self.projector.group(group).await
    }

    /// Link the group to, or unlink it from, users, roles and policies.
    pub async fn patch_group(
        &self,
        org_id: Uuid,
        id: Uuid,
        patch: ReferencePatch,
    ) -> GraphResult<PatchOutcome<EntityRef>> {
        self.patch_references(org_id, EntityRef::group(id), patch)
            .await
    }

    pub async fn delete_group(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        self.delete_entity(org_id, EntityRef::group(id)).await
    }

    // -----------------------------------------------------------------------
    // Policies
    // -----------------------------------------------------------------------

    /// Create a policy. The active version, if set, must be one of the
    /// initial contents.
    #[instrument(skip(self, input), fields(org_id = %input.org_id, identifier = %input.identifier))]
    pub async fn create_policy(&self, input: CreatePolicy) -> GraphResult<PolicyView> {
        validate_identifier("policy", &input.identifier)?;
        validate_name("policy", &input.name)?;
        for content in &input.contents {
            validate_identifier("policy version", &content.version)?;
        }
        ensure_unique(
            "policy version",
            input.contents.iter().map(|c| c.version.as_str()),
        )?;
        if let Some(active) = &input.active_version
            && !input.contents.iter().any(|c| &c.version == active)
        {
            return Err(GraphError::invalid_input(format!(
                "active version {active} is not a content version"
            )));
        }
        self.ensure_organization(input.org_id).await?;

        let org_id = input.org_id;
        let result = within(
            self.config.store_timeout(),
            "policy.create",
            self.store.policies().create(input),
        )
        .await;
        let policy = self.settle(org_id, result, |_| true).await?;
        info!(policy_id = %policy.id, "Policy created");
        self.projector.policy(policy).await
    }

    pub async fn get_policy(&self, org_id: Uuid, id: Uuid) -> GraphResult<PolicyView> {
        let policy = within(
            self.config.store_timeout(),
            "policy.get",
            self.store.policies().get_by_id(org_id, id),
        )
        .await?;
        self.projector.policy(policy).await
    }

    pub async fn get_policy_by_identifier(
        &self,
        org_id: Uuid,
        identifier: &str,
    ) -> GraphResult<PolicyView> {
        let policy = within(
            self.config.store_timeout(),
            "policy.get",
            self.store.policies().get_by_identifier(org_id, identifier),
        )
        .await?;
        self.projector.policy(policy).await
    }

    pub async fn list_policies(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> GraphResult<PaginatedResult<PolicyView>> {
        let page = within(
            self.config.store_timeout(),
            "policy.list",
            self.store.policies().list(org_id, pagination),
        )
        .await?;
        let mut items = Vec::with_capacity(page.items.len());
        for policy in page.items {
            items.push(self.projector.policy(policy).await?);
        }
        Ok(PaginatedResult {
            items,
            total: page.total,
            offset: page.offset,
            limit: page.limit,
        })
    }

    /// Rename a policy or switch its active version. A new active version
    /// must name existing content.
    pub async fn update_policy(
        &self,
        org_id: Uuid,
        id: Uuid,
        input: UpdatePolicy,
    ) -> GraphResult<PolicyView> {
        let timeout = self.config.store_timeout();
        if let Some(name) = &input.name {
            validate_name("policy", name)?;
        }
        if let Some(Some(version)) = &input.active_version {
            let current = within(
                timeout,
                "policy.get",
                self.store.policies().get_by_id(org_id, id),
            )
            .await?;
            if current.content_by_version(version).is_none() {
                return Err(GraphError::invalid_input(format!(
                    "active version {version} is not a content version"
                )));
            }
        }

        let result = within(
            timeout,
            "policy.update",
            self.store.policies().update(org_id, id, input),
        )
        .await;
        let policy = self.settle(org_id, result, |_| true).await?;
        self.projector.policy(policy).await
    }

    /// Link the policy to, or unlink it from, users and groups.
    pub async fn patch_policy(
        &self,
        org_id: Uuid,
        id: Uuid,
        patch: ReferencePatch,
    ) -> GraphResult<PatchOutcome<EntityRef>> {
        self.patch_references(org_id, EntityRef::policy(id), patch)
            .await
    }

    pub async fn patch_policy_contents(
        &self,
        org_id: Uuid,
        id: Uuid,
        patch: PolicyContentPatch,
    ) -> GraphResult<PatchOutcome<Uuid>> {
        let result = self.patch.apply_contents(org_id, id, patch).await;
        self.settle(org_id, result, PatchOutcome::changed).await
    }

    pub async fn delete_policy(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        self.delete_entity(org_id, EntityRef::policy(id)).await
    }

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    /// Link two entities. Returns whether anything changed.
    pub async fn assign_edge(&self, org_id: Uuid, a: EntityRef, b: EntityRef) -> GraphResult<bool> {
        let result = self.link.assign(org_id, a, b).await;
        self.settle(org_id, result, |changed| *changed).await
    }

    /// Unlink two entities. Returns whether anything changed.
    pub async fn unassign_edge(
        &self,
        org_id: Uuid,
        a: EntityRef,
        b: EntityRef,
    ) -> GraphResult<bool> {
        let result = self.link.unassign(org_id, a, b).await;
        self.settle(org_id, result, |changed| *changed).await
    }

    async fn patch_references(
        &self,
        org_id: Uuid,
        target: EntityRef,
        patch: ReferencePatch,
    ) -> GraphResult<PatchOutcome<EntityRef>> {
        let result = self.patch.apply_references(org_id, target, patch).await;
        self.settle(org_id, result, PatchOutcome::changed).await
    }

    /// Delete any entity kind with cascade.
    pub async fn delete_entity(&self, org_id: Uuid, entity: EntityRef) -> GraphResult<()> {
        let result = self.cascade.delete_entity(org_id, entity).await;
        // A NotFound delete may still have stripped dangling references.
        let healed = matches!(&result, Err(e) if e.is_not_found());
        if healed {
            self.checker.invalidate(org_id).await;
        }
        self.settle(org_id, result, |_| true).await
    }

    // -----------------------------------------------------------------------
    // Checks and relationship tuples
    // -----------------------------------------------------------------------

    pub async fn check(&self, org_id: Uuid, request: CheckRequest) -> GraphResult<CheckOutcome> {
        self.checker.check(org_id, request).await
    }

    /// Check on behalf of the organization owning `api_key`, caching under
    /// the key. An unknown key is `Unauthorized`.
    pub async fn check_with_key(
        &self,
        api_key: &str,
        request: CheckRequest,
    ) -> GraphResult<CheckOutcome> {
        let org = match self.get_organization_by_api_key(api_key).await {
            Ok(org) => org,
            Err(e) if e.is_not_found() => {
                return Err(GraphError::Unauthorized {
                    reason: "unknown API key".into(),
                });
            }
            Err(e) => return Err(e),
        };
        self.checker
            .check_in(org.id, api_key.to_string(), request)
            .await
    }

    /// Write a tuple to the relationship engine.
    ///
    /// Tuples are shared by every organization, so every cached decision is
    /// dropped rather than one organization's.
    #[instrument(skip(self), fields(tuple = %tuple))]
    pub async fn write_relation(&self, tuple: RelationTuple) -> GraphResult<()> {
        for (label, value) in [
            ("namespace", &tuple.namespace),
            ("object", &tuple.object),
            ("relation", &tuple.relation),
        ] {
            if value.trim().is_empty() {
                return Err(GraphError::invalid_input(format!("{label} is required")));
            }
        }
        let result = within(
            self.config.tuple_timeout(),
            "tuple.write",
            self.tuples.write_tuple(tuple),
        )
        .await;
        self.checker.flush().await;
        result
    }

    pub async fn list_relations(&self, query: TupleQuery) -> GraphResult<Vec<RelationTuple>> {
        within(
            self.config.tuple_timeout(),
            "tuple.list",
            self.tuples.list_tuples(&query),
        )
        .await
    }

    pub async fn flush_decision_cache(&self) {
        self.checker.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_keys_are_rejected() {
        assert!(ensure_unique("action", ["read", "write"].into_iter()).is_ok());
        let err = ensure_unique("action", ["read", "read"].into_iter()).unwrap_err();
        assert!(matches!(err, GraphError::InvalidInput { .. }));
    }
}
