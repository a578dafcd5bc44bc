//! Cascade deletion.
//!
//! Deleting an entity removes its record and then strips its id from every
//! reference set that can hold it, one set-subtraction per slot across the
//! whole organization. The strip pass also runs when the record was already
//! gone, which repairs references left dangling by an edge write that raced
//! with an earlier delete.

use std::sync::Arc;

use accessgraph_core::error::{GraphError, GraphResult};
use accessgraph_core::models::reference::{EntityKind, EntityRef, ReferenceSlot};
use accessgraph_core::repository::{
    GraphStore, GroupRepository, PolicyRepository, ReferenceRepository, ResourceRepository,
    RoleRepository, UserRepository,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::deadline::within;

pub struct CascadeEngine<S> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: GraphStore> CascadeEngine<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Delete `entity` and every reference to it.
    ///
    /// Fails with `NotFound` when the entity did not exist. Each step is
    /// idempotent, so a `SystemError` part-way through is recovered by
    /// calling this again.
    #[instrument(skip(self), fields(org_id = %org_id, entity = %entity))]
    pub async fn delete_entity(&self, org_id: Uuid, entity: EntityRef) -> GraphResult<()> {
        if entity.kind == EntityKind::Resource {
            return self.delete_resource(org_id, entity.id).await;
        }

        let timeout = self.config.store_timeout();
        let removed = match within(timeout, "entity.delete", self.delete_record(org_id, entity)).await
        {
            Ok(()) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e),
        };

        let mut stripped = 0;
        for slot in ReferenceSlot::targeting(entity.kind) {
            stripped += within(
                timeout,
                "reference.pull_everywhere",
                self.store
                    .references()
                    .pull_reference_everywhere(org_id, slot, entity.id),
            )
            .await?;
        }

        if removed {
            info!(stripped, "Entity deleted");
            Ok(())
        } else {
            if stripped > 0 {
                warn!(stripped, "Removed dangling references to an absent entity");
            }
            Err(GraphError::not_found(entity.kind.as_str(), entity.id))
        }
    }

    async fn delete_record(&self, org_id: Uuid, entity: EntityRef) -> GraphResult<()> {
        match entity.kind {
            EntityKind::User => self.store.users().delete(org_id, entity.id).await,
            EntityKind::Role => self.store.roles().delete(org_id, entity.id).await,
            EntityKind::Group => self.store.groups().delete(org_id, entity.id).await,
            EntityKind::Policy => self.store.policies().delete(org_id, entity.id).await,
            EntityKind::Resource => self.store.resources().delete(org_id, entity.id).await,
        }
    }

    /// Resources are referenced by identifier from role permissions rather
    /// than by id, so the record is read first to learn its identifier.
    /// Grants are revoked before the record goes, which keeps a retry after
    /// a failed delete able to find the identifier again.
    async fn delete_resource(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        let timeout = self.config.store_timeout();
        let resources = self.store.resources();

        let resource = within(timeout, "resource.get", resources.get_by_id(org_id, id)).await?;
        let revoked = within(
            timeout,
            "role.remove_permissions_for_resource",
            self.store
                .roles()
                .remove_permissions_for_resource(org_id, &resource.identifier),
        )
        .await?;
        debug!(resource = %resource.identifier, roles = revoked, "Revoked grants for resource");

        within(timeout, "resource.delete", resources.delete(org_id, id)).await?;
        info!("Entity deleted");
        Ok(())
    }
}
