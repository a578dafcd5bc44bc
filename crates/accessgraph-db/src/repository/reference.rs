//! SurrealDB implementation of [`ReferenceRepository`].
//!
//! Reference sets are string arrays on the owning record. Every push and
//! pull is one guarded UPDATE, so the set changes atomically and a repeated
//! call reports `false` instead of duplicating or failing.

use std::collections::{BTreeSet, HashMap};

use accessgraph_core::error::GraphResult;
use accessgraph_core::models::reference::{EntityKind, ReferenceSlot};
use accessgraph_core::models::summary::EntitySummary;
use accessgraph_core::repository::ReferenceRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{bulk_update, guarded_update, parse_id_set, parse_uuid, record_exists};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ReferenceRow {
    refs: Vec<String>,
}

#[derive(Debug, SurrealValue)]
struct SummaryRow {
    record_id: String,
    identifier: String,
    name: String,
}

/// Display-name column per table; users carry a username instead of a name.
fn name_column(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::User => "username",
        _ => "name",
    }
}

/// SurrealDB implementation of the reference-set primitives.
#[derive(Clone)]
pub struct SurrealReferenceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealReferenceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ReferenceRepository for SurrealReferenceRepository<C> {
    async fn exists(&self, org_id: Uuid, kind: EntityKind, id: Uuid) -> GraphResult<bool> {
        Ok(record_exists(&self.db, kind.as_str(), org_id, id).await?)
    }

    async fn get_references(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        id: Uuid,
    ) -> GraphResult<BTreeSet<Uuid>> {
        let table = slot.owner().as_str();
        let query = format!(
            "SELECT {field} AS refs FROM type::record('{table}', $id) \
             WHERE org_id = $org_id",
            field = slot.field(),
        );

        let mut result = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("org_id", org_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ReferenceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(table, id))?;
        Ok(parse_id_set(row.refs)?)
    }

    async fn push_reference(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        id: Uuid,
        target: Uuid,
    ) -> GraphResult<bool> {
        let table = slot.owner().as_str();
        let query = format!(
            "UPDATE type::record('{table}', $id) SET \
             {field} += $target, updated_at = time::now() \
             WHERE org_id = $org_id AND {field} CONTAINSNOT $target",
            field = slot.field(),
        );
        Ok(guarded_update(
            &self.db,
            table,
            &query,
            org_id,
            id,
            vec![("target", target.to_string().into())],
        )
        .await?)
    }

    async fn pull_reference(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        id: Uuid,
        target: Uuid,
    ) -> GraphResult<bool> {
        let table = slot.owner().as_str();
        let query = format!(
            "UPDATE type::record('{table}', $id) SET \
             {field} -= $target, updated_at = time::now() \
             WHERE org_id = $org_id AND {field} CONTAINS $target",
            field = slot.field(),
        );
        Ok(guarded_update(
            &self.db,
            table,
            &query,
            org_id,
            id,
            vec![("target", target.to_string().into())],
        )
        .await?)
    }

    async fn pull_reference_everywhere(
        &self,
        org_id: Uuid,
        slot: ReferenceSlot,
        target: Uuid,
    ) -> GraphResult<u64> {
        let query = format!(
            "UPDATE {table} SET {field} -= $target, updated_at = time::now() \
             WHERE org_id = $org_id AND {field} CONTAINS $target",
            table = slot.owner().as_str(),
            field = slot.field(),
        );
        Ok(bulk_update(
            &self.db,
            &query,
            org_id,
            vec![("target", target.to_string().into())],
        )
        .await?)
    }

    async fn summaries(
        &self,
        org_id: Uuid,
        kind: EntityKind,
        ids: Vec<Uuid>,
    ) -> GraphResult<Vec<EntitySummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT meta::id(id) AS record_id, identifier, {name} AS name \
             FROM {table} WHERE org_id = $org_id AND meta::id(id) IN $ids",
            name = name_column(kind),
            table = kind.as_str(),
        );
        let id_strings: Vec<String> = ids.iter().map(Uuid::to_string).collect();

        let mut result = self
            .db
            .query(query)
            .bind(("org_id", org_id.to_string()))
            .bind(("ids", id_strings))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SummaryRow> = result.take(0).map_err(DbError::from)?;
        let mut found = rows
            .into_iter()
            .map(|row| {
                let id = parse_uuid(&row.record_id, kind.as_str())?;
                Ok((
                    id,
                    EntitySummary {
                        id,
                        kind,
                        identifier: row.identifier,
                        name: row.name,
                    },
                ))
            })
            .collect::<Result<HashMap<_, _>, DbError>>()?;

        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }
}
