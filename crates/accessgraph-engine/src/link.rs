//! Link maintenance: symmetric assignment and removal of edges.
//!
//! An edge lives in two reference sets, one on each endpoint, and the store
//! only updates one document atomically. Every edge mutation is therefore
//! two legs: the left endpoint's set, then the right endpoint's set. Each
//! leg is an idempotent push or pull, so re-running a whole operation is
//! always safe.
//!
//! If the second leg keeps failing after its retries, the first leg is
//! reverted so the edge ends up fully present or fully absent. A revert
//! that itself fails leaves an asymmetric edge; that is logged at `warn`
//! and repaired by the next cascade delete of either endpoint.

use std::sync::Arc;

use accessgraph_core::error::{GraphError, GraphResult};
use accessgraph_core::models::reference::{Edge, EntityRef, ReferenceSlot};
use accessgraph_core::repository::{GraphStore, ReferenceRepository};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::deadline::within;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkOp {
    Assign,
    Unassign,
}

impl LinkOp {
    fn inverse(self) -> LinkOp {
        match self {
            LinkOp::Assign => LinkOp::Unassign,
            LinkOp::Unassign => LinkOp::Assign,
        }
    }
}

/// Applies edge mutations to both endpoints.
pub struct LinkEngine<S> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S> Clone for LinkEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: GraphStore> LinkEngine<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Create the edge between `a` and `b` on both endpoints. Returns
    /// whether either endpoint changed; an existing edge is a no-op.
    ///
    /// Fails with `InvalidInput` for an unsupported pair and `NotFound`
    /// naming the missing endpoint.
    #[instrument(skip(self), fields(org_id = %org_id, a = %a, b = %b))]
    pub async fn assign(&self, org_id: Uuid, a: EntityRef, b: EntityRef) -> GraphResult<bool> {
        let edge = Edge::between(a, b)?;
        self.apply(org_id, edge, LinkOp::Assign).await
    }

    /// Remove the edge between `a` and `b` from both endpoints. Removing an
    /// absent edge is a no-op.
    #[instrument(skip(self), fields(org_id = %org_id, a = %a, b = %b))]
    pub async fn unassign(&self, org_id: Uuid, a: EntityRef, b: EntityRef) -> GraphResult<bool> {
        let edge = Edge::between(a, b)?;
        self.apply(org_id, edge, LinkOp::Unassign).await
    }

    /// Fail with `NotFound` unless the entity exists in the organization.
    pub async fn ensure_exists(&self, org_id: Uuid, entity: EntityRef) -> GraphResult<()> {
        let exists = within(
            self.config.store_timeout(),
            "reference.exists",
            self.store.references().exists(org_id, entity.kind, entity.id),
        )
        .await?;
        if exists {
            Ok(())
        } else {
            Err(GraphError::not_found(entity.kind.as_str(), entity.id))
        }
    }

    async fn apply(&self, org_id: Uuid, edge: Edge, op: LinkOp) -> GraphResult<bool> {
        self.ensure_exists(org_id, edge.left_ref()).await?;
        self.ensure_exists(org_id, edge.right_ref()).await?;

        let left_slot = edge.relation.left_slot();
        let right_slot = edge.relation.right_slot();

        let first = match self.leg(org_id, op, left_slot, edge.left, edge.right).await {
            Ok(changed) => changed,
            // The left endpoint vanished since the existence check; nothing
            // of it is left to unlink, so only the right side needs work.
            Err(e) if e.is_not_found() && op == LinkOp::Unassign => false,
            Err(e) => return Err(e),
        };

        match self
            .leg_with_retry(org_id, op, right_slot, edge.right, edge.left)
            .await
        {
            Ok(second) => {
                debug!(%edge, ?op, changed = first || second, "Edge applied");
                Ok(first || second)
            }
            Err(e) if e.is_not_found() && op == LinkOp::Unassign => {
                debug!(%edge, "Right endpoint vanished during unassign");
                Ok(first)
            }
            Err(e) => {
                if first {
                    self.compensate(org_id, op, left_slot, &edge).await;
                }
                Err(e)
            }
        }
    }

    async fn leg(
        &self,
        org_id: Uuid,
        op: LinkOp,
        slot: ReferenceSlot,
        owner: Uuid,
        target: Uuid,
    ) -> GraphResult<bool> {
        let references = self.store.references();
        let timeout = self.config.store_timeout();
        match op {
            LinkOp::Assign => {
                within(
                    timeout,
                    "reference.push",
                    references.push_reference(org_id, slot, owner, target),
                )
                .await
            }
            LinkOp::Unassign => {
                within(
                    timeout,
                    "reference.pull",
                    references.pull_reference(org_id, slot, owner, target),
                )
                .await
            }
        }
    }

    async fn leg_with_retry(
        &self,
        org_id: Uuid,
        op: LinkOp,
        slot: ReferenceSlot,
        owner: Uuid,
        target: Uuid,
    ) -> GraphResult<bool> {
        let mut attempt = 0;
        loop {
            match self.leg(org_id, op, slot, owner, target).await {
                Err(e) if e.is_retryable() && attempt < self.config.edge_retry_attempts => {
                    attempt += 1;
                    warn!(
                        org_id = %org_id,
                        %slot,
                        owner = %owner,
                        attempt,
                        error = %e,
                        "Second edge leg failed, retrying"
                    );
                    tokio::time::sleep(self.config.edge_retry_backoff() * attempt).await;
                }
                result => return result,
            }
        }
    }

    async fn compensate(&self, org_id: Uuid, op: LinkOp, slot: ReferenceSlot, edge: &Edge) {
        match self
            .leg(org_id, op.inverse(), slot, edge.left, edge.right)
            .await
        {
            Ok(_) => debug!(%edge, "Reverted first edge leg"),
            Err(e) => warn!(
                org_id = %org_id,
                %edge,
                error = %e,
                "Asymmetric edge left behind; the next cascade delete of either endpoint repairs it"
            ),
        }
    }
}
