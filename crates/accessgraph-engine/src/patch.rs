//! Patch algebra: incremental edits diffed against current state.
//!
//! Every patch is validated in full before the first write, so a rejected
//! patch changes nothing. Accepted entries are then processed in input order
//! (duplicates collapsed) and each one is diffed against the stored state:
//! an entry that is already satisfied is reported as skipped instead of
//! being written again. Re-sending a patch therefore yields the same state
//! and reports every entry as skipped.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use accessgraph_core::error::{GraphError, GraphResult};
use accessgraph_core::models::permission::Permission;
use accessgraph_core::models::policy::PolicyContentPatch;
use accessgraph_core::models::reference::{EntityRef, ReferencePatch, ReferenceSlot, Relation};
use accessgraph_core::models::resource::{Resource, ResourceActionPatch};
use accessgraph_core::models::role::RolePermissionPatch;
use accessgraph_core::repository::{
    GraphStore, PolicyRepository, ReferenceRepository, ResourceRepository, RoleRepository,
};
use accessgraph_core::validation::{validate_identifier, validate_name};
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::deadline::within;
use crate::link::LinkEngine;

/// What a patch did, entry by entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchOutcome<T> {
    /// Entries that were written.
    pub added: Vec<T>,
    /// Entries that were removed.
    pub removed: Vec<T>,
    /// Entries that were already satisfied.
    pub skipped: Vec<T>,
}

impl<T> Default for PatchOutcome<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> PatchOutcome<T> {
    /// Whether the patch wrote anything.
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Drop repeated entries, keeping the first occurrence.
fn dedup_in_order<T: Clone + Eq + std::hash::Hash>(items: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert((*item).clone()))
        .cloned()
        .collect()
}

fn reject_overlap<T: Eq + std::hash::Hash + std::fmt::Display>(
    added: &[T],
    removed: &[T],
) -> GraphResult<()> {
    let added: HashSet<&T> = added.iter().collect();
    match removed.iter().find(|r| added.contains(r)) {
        Some(both) => Err(GraphError::invalid_input(format!(
            "{both} is both added and removed"
        ))),
        None => Ok(()),
    }
}

pub struct PatchEngine<S> {
    store: Arc<S>,
    link: LinkEngine<S>,
    config: EngineConfig,
}

impl<S: GraphStore> PatchEngine<S> {
    pub fn new(store: Arc<S>, link: LinkEngine<S>, config: EngineConfig) -> Self {
        Self {
            store,
            link,
            config,
        }
    }

    /// Link and unlink entities to `target`.
    ///
    /// Fails with `NotFound` when the target is absent and with
    /// `InvalidInput` when a listed entity is absent or of a kind that
    /// cannot be linked to the target.
    #[instrument(skip(self, patch), fields(org_id = %org_id, target = %target))]
    pub async fn apply_references(
        &self,
        org_id: Uuid,
        target: EntityRef,
        patch: ReferencePatch,
    ) -> GraphResult<PatchOutcome<EntityRef>> {
        self.link.ensure_exists(org_id, target).await?;

        let added = dedup_in_order(&patch.added);
        let removed = dedup_in_order(&patch.removed);
        reject_overlap(&added, &removed)?;
        for entry in added.iter().chain(removed.iter()) {
            self.validate_reference(org_id, target, *entry).await?;
        }

        let mut current: HashMap<ReferenceSlot, BTreeSet<Uuid>> = HashMap::new();
        let mut outcome = PatchOutcome::default();

        for entry in added {
            let members = self.members(org_id, target, entry, &mut current).await?;
            if members.contains(&entry.id) {
                outcome.skipped.push(entry);
            } else if self.link.assign(org_id, target, entry).await? {
                outcome.added.push(entry);
            } else {
                outcome.skipped.push(entry);
            }
        }

        for entry in removed {
            let members = self.members(org_id, target, entry, &mut current).await?;
            if !members.contains(&entry.id) {
                outcome.skipped.push(entry);
            } else if self.link.unassign(org_id, target, entry).await? {
                outcome.removed.push(entry);
            } else {
                outcome.skipped.push(entry);
            }
        }

        debug!(
            added = outcome.added.len(),
            removed = outcome.removed.len(),
            skipped = outcome.skipped.len(),
            "Reference patch applied"
        );
        Ok(outcome)
    }

    async fn validate_reference(
        &self,
        org_id: Uuid,
        target: EntityRef,
        entry: EntityRef,
    ) -> GraphResult<()> {
        if Relation::between(target.kind, entry.kind).is_none() {
            return Err(GraphError::invalid_input(format!(
                "a {} cannot be linked to a {}",
                entry.kind, target.kind
            )));
        }
        let exists = within(
            self.config.store_timeout(),
            "reference.exists",
            self.store.references().exists(org_id, entry.kind, entry.id),
        )
        .await?;
        if !exists {
            return Err(GraphError::invalid_input(format!("unknown {entry}")));
        }
        Ok(())
    }

    /// The target's reference set holding `entry`'s kind, read once per
    /// slot. Entries are deduplicated, so later writes never revisit it.
    async fn members<'a>(
        &self,
        org_id: Uuid,
        target: EntityRef,
        entry: EntityRef,
        current: &'a mut HashMap<ReferenceSlot, BTreeSet<Uuid>>,
    ) -> GraphResult<&'a BTreeSet<Uuid>> {
        let slot = ReferenceSlot::of(target.kind, entry.kind).ok_or_else(|| {
            GraphError::invalid_input(format!(
                "a {} cannot be linked to a {}",
                entry.kind, target.kind
            ))
        })?;
        if !current.contains_key(&slot) {
            let set = within(
                self.config.store_timeout(),
                "reference.get",
                self.store.references().get_references(org_id, slot, target.id),
            )
            .await?;
            current.insert(slot, set);
        }
        current
            .get(&slot)
            .ok_or_else(|| GraphError::System(format!("reference set {slot} not loaded")))
    }

    /// Fail with `InvalidInput` unless every permission names an existing
    /// resource and action.
    pub async fn validate_grants(&self, org_id: Uuid, grants: &[Permission]) -> GraphResult<()> {
        let timeout = self.config.store_timeout();
        let mut resources: HashMap<&str, Resource> = HashMap::new();
        for permission in grants {
            if !resources.contains_key(permission.resource.as_str()) {
                let resource = match within(
                    timeout,
                    "resource.get",
                    self.store
                        .resources()
                        .get_by_identifier(org_id, &permission.resource),
                )
                .await
                {
                    Ok(resource) => resource,
                    Err(e) if e.is_not_found() => {
                        return Err(GraphError::invalid_input(format!(
                            "unknown resource {}",
                            permission.resource
                        )));
                    }
                    Err(e) => return Err(e),
                };
                resources.insert(permission.resource.as_str(), resource);
            }
            let has_action = resources
                .get(permission.resource.as_str())
                .is_some_and(|r| r.has_action(&permission.action));
            if !has_action {
                return Err(GraphError::invalid_input(format!(
                    "unknown action {} on resource {}",
                    permission.action, permission.resource
                )));
            }
        }
        Ok(())
    }

    /// Grant and revoke permissions on a role.
    ///
    /// A granted permission must name an existing resource and action.
    /// Revoking a permission the role does not hold is a no-op.
    #[instrument(skip(self, patch), fields(org_id = %org_id, role_id = %role_id))]
    pub async fn apply_permissions(
        &self,
        org_id: Uuid,
        role_id: Uuid,
        patch: RolePermissionPatch,
    ) -> GraphResult<PatchOutcome<Permission>> {
        let timeout = self.config.store_timeout();
        let role = within(
            timeout,
            "role.get",
            self.store.roles().get_by_id(org_id, role_id),
        )
        .await?;

        let added = dedup_in_order(&patch.added);
        let removed = dedup_in_order(&patch.removed);
        reject_overlap(&added, &removed)?;

        self.validate_grants(org_id, &added).await?;

        let mut outcome = PatchOutcome::default();
        let roles = self.store.roles();

        for permission in added {
            let written = !role.permissions.contains(&permission)
                && within(
                    timeout,
                    "role.add_permission",
                    roles.add_permission(org_id, role_id, permission.clone()),
                )
                .await?;
            if written {
                outcome.added.push(permission);
            } else {
                outcome.skipped.push(permission);
            }
        }

        for permission in removed {
            let written = role.permissions.contains(&permission)
                && within(
                    timeout,
                    "role.remove_permission",
                    roles.remove_permission(org_id, role_id, &permission),
                )
                .await?;
            if written {
                outcome.removed.push(permission);
            } else {
                outcome.skipped.push(permission);
            }
        }

        Ok(outcome)
    }

    /// Add and remove actions on a resource. Outcome entries are action
    /// identifiers. Removing an action also revokes every role permission
    /// that names it.
    #[instrument(skip(self, patch), fields(org_id = %org_id, resource_id = %resource_id))]
    pub async fn apply_actions(
        &self,
        org_id: Uuid,
        resource_id: Uuid,
        patch: ResourceActionPatch,
    ) -> GraphResult<PatchOutcome<String>> {
        let timeout = self.config.store_timeout();
        let resource = within(
            timeout,
            "resource.get",
            self.store.resources().get_by_id(org_id, resource_id),
        )
        .await?;

        {
            let mut seen = HashSet::new();
            for action in &patch.added {
                validate_identifier("action", &action.identifier)?;
                validate_name("action", &action.name)?;
                if !seen.insert(action.identifier.as_str()) {
                    return Err(GraphError::invalid_input(format!(
                        "action {} is listed twice",
                        action.identifier
                    )));
                }
            }
        }
        let removed = dedup_in_order(&patch.removed);
        let added_ids: Vec<String> = patch.added.iter().map(|a| a.identifier.clone()).collect();
        reject_overlap(&added_ids, &removed)?;

        let mut outcome = PatchOutcome::default();
        let resources = self.store.resources();

        for action in patch.added {
            let identifier = action.identifier.clone();
            let written = !resource.has_action(&identifier)
                && within(
                    timeout,
                    "resource.add_action",
                    resources.add_action(org_id, resource_id, action.into_action()),
                )
                .await?;
            if written {
                outcome.added.push(identifier);
            } else {
                outcome.skipped.push(identifier);
            }
        }

        for identifier in removed {
            let written = resource.has_action(&identifier)
                && within(
                    timeout,
                    "resource.remove_action",
                    resources.remove_action(org_id, resource_id, &identifier),
                )
                .await?;

            // Also runs for absent actions, clearing grants left by an
            // interrupted earlier removal.
            let revoked = within(
                timeout,
                "role.remove_permissions_for_action",
                self.store.roles().remove_permissions_for_action(
                    org_id,
                    &resource.identifier,
                    &identifier,
                ),
            )
            .await?;
            debug!(action = %identifier, roles = revoked, "Revoked grants for removed action");

            if written {
                outcome.removed.push(identifier);
            } else {
                outcome.skipped.push(identifier);
            }
        }

        Ok(outcome)
    }

    /// Add and remove policy content versions. Outcome entries are content
    /// ids; an added version that already exists is skipped and reported
    /// with the existing content's id.
    ///
    /// The active version cannot be removed.
    #[instrument(skip(self, patch), fields(org_id = %org_id, policy_id = %policy_id))]
    pub async fn apply_contents(
        &self,
        org_id: Uuid,
        policy_id: Uuid,
        patch: PolicyContentPatch,
    ) -> GraphResult<PatchOutcome<Uuid>> {
        let timeout = self.config.store_timeout();
        let policy = within(
            timeout,
            "policy.get",
            self.store.policies().get_by_id(org_id, policy_id),
        )
        .await?;

        {
            let mut seen = HashSet::new();
            for content in &patch.added {
                validate_identifier("policy version", &content.version)?;
                if !seen.insert(content.version.as_str()) {
                    return Err(GraphError::invalid_input(format!(
                        "policy version {} is listed twice",
                        content.version
                    )));
                }
            }
        }
        let removed = dedup_in_order(&patch.removed);
        if let Some(active) = policy.active_content()
            && removed.contains(&active.id)
        {
            return Err(GraphError::invalid_input(format!(
                "policy version {} is active and cannot be removed",
                active.version
            )));
        }

        let mut outcome = PatchOutcome::default();
        let policies = self.store.policies();

        for content in patch.added {
            if let Some(existing) = policy.content_by_version(&content.version) {
                outcome.skipped.push(existing.id);
                continue;
            }
            let content = content.into_content();
            let id = content.id;
            if within(
                timeout,
                "policy.add_content",
                policies.add_content(org_id, policy_id, content),
            )
            .await?
            {
                outcome.added.push(id);
            } else {
                outcome.skipped.push(id);
            }
        }

        for content_id in removed {
            let written = policy.contents.iter().any(|c| c.id == content_id)
                && within(
                    timeout,
                    "policy.remove_content",
                    policies.remove_content(org_id, policy_id, content_id),
                )
                .await?;
            if written {
                outcome.removed.push(content_id);
            } else {
                outcome.skipped.push(content_id);
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        assert_eq!(dedup_in_order(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    #[test]
    fn overlapping_entries_are_rejected() {
        let err = reject_overlap(&["a", "b"], &["c", "b"]).unwrap_err();
        assert!(matches!(err, GraphError::InvalidInput { .. }));
        assert!(reject_overlap(&["a"], &["b"]).is_ok());
    }

    #[test]
    fn outcome_reports_changes() {
        let mut outcome = PatchOutcome::<u8>::default();
        assert!(!outcome.changed());
        outcome.skipped.push(1);
        assert!(!outcome.changed());
        outcome.removed.push(2);
        assert!(outcome.changed());
    }
}
