//! SurrealDB repository implementations.

use std::collections::BTreeSet;

use serde::Serialize;
use serde::de::DeserializeOwned;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

mod group;
mod organization;
mod policy;
mod reference;
mod resource;
mod role;
mod user;

pub use group::SurrealGroupRepository;
pub use organization::{SurrealOrganizationRepository, generate_api_key};
pub use policy::SurrealPolicyRepository;
pub use reference::SurrealReferenceRepository;
pub use resource::SurrealResourceRepository;
pub use role::SurrealRoleRepository;
pub use user::SurrealUserRepository;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

pub(crate) fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Corrupt(format!("invalid {what} UUID: {e}")))
}

pub(crate) fn parse_id_set(raw: Vec<String>) -> Result<BTreeSet<Uuid>, DbError> {
    raw.iter().map(|s| parse_uuid(s, "reference")).collect()
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(value).map_err(|e| DbError::Corrupt(e.to_string()))
}

pub(crate) fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, DbError> {
    serde_json::from_value(value).map_err(|e| DbError::Corrupt(e.to_string()))
}

/// Whether a record of `table` with this id exists inside the organization.
pub(crate) async fn record_exists<C: Connection>(
    db: &Surreal<C>,
    table: &str,
    org_id: Uuid,
    id: Uuid,
) -> Result<bool, DbError> {
    let query = format!(
        "SELECT count() AS total FROM {table} \
         WHERE id = type::record('{table}', $id) \
         AND org_id = $org_id GROUP ALL"
    );
    let mut result = db
        .query(query)
        .bind(("id", id.to_string()))
        .bind(("org_id", org_id.to_string()))
        .await?;
    let rows: Vec<CountRow> = result.take(0)?;
    Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
}

/// Run a single-record UPDATE whose WHERE clause doubles as a guard
/// (e.g. `CONTAINSNOT`). An empty result means the guard rejected the
/// change or the record is absent; a count query tells the two apart.
///
/// The query must bind `$id` and `$org_id`; `binds` supplies the rest.
pub(crate) async fn guarded_update<C: Connection>(
    db: &Surreal<C>,
    table: &str,
    query: &str,
    org_id: Uuid,
    id: Uuid,
    binds: Vec<(&'static str, serde_json::Value)>,
) -> Result<bool, DbError> {
    let mut builder = db
        .query(query)
        .bind(("id", id.to_string()))
        .bind(("org_id", org_id.to_string()));
    for bind in binds {
        builder = builder.bind(bind);
    }

    let mut result = builder
        .await?
        .check()
        .map_err(|e| DbError::Query(e.to_string()))?;
    let changed: Vec<surrealdb_types::Value> = result.take(0)?;
    if !changed.is_empty() {
        return Ok(true);
    }

    if record_exists(db, table, org_id, id).await? {
        Ok(false)
    } else {
        Err(DbError::not_found(table, id))
    }
}

/// Run an org-wide UPDATE and report how many records it touched.
pub(crate) async fn bulk_update<C: Connection>(
    db: &Surreal<C>,
    query: &str,
    org_id: Uuid,
    binds: Vec<(&'static str, serde_json::Value)>,
) -> Result<u64, DbError> {
    let mut builder = db.query(query).bind(("org_id", org_id.to_string()));
    for bind in binds {
        builder = builder.bind(bind);
    }

    let mut result = builder
        .await?
        .check()
        .map_err(|e| DbError::Query(e.to_string()))?;
    let changed: Vec<surrealdb_types::Value> = result.take(0)?;
    Ok(changed.len() as u64)
}

/// Delete one organization-scoped record. Fails with `NotFound` when
/// nothing was removed.
pub(crate) async fn delete_record<C: Connection>(
    db: &Surreal<C>,
    table: &str,
    org_id: Uuid,
    id: Uuid,
) -> Result<(), DbError> {
    let query = format!(
        "DELETE type::record('{table}', $id) \
         WHERE org_id = $org_id RETURN BEFORE"
    );
    let mut result = db
        .query(query)
        .bind(("id", id.to_string()))
        .bind(("org_id", org_id.to_string()))
        .await?
        .check()
        .map_err(|e| DbError::Query(e.to_string()))?;
    let removed: Vec<surrealdb_types::Value> = result.take(0)?;
    if removed.is_empty() {
        return Err(DbError::not_found(table, id));
    }
    Ok(())
}

/// Count the records of `table` owned by the organization.
pub(crate) async fn count_records<C: Connection>(
    db: &Surreal<C>,
    table: &str,
    org_id: Uuid,
) -> Result<u64, DbError> {
    let query = format!(
        "SELECT count() AS total FROM {table} \
         WHERE org_id = $org_id GROUP ALL"
    );
    let mut result = db.query(query).bind(("org_id", org_id.to_string())).await?;
    let rows: Vec<CountRow> = result.take(0)?;
    Ok(rows.first().map(|r| r.total).unwrap_or(0))
}
