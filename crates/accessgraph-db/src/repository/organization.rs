//! SurrealDB implementation of [`OrganizationRepository`].

use accessgraph_core::error::GraphResult;
use accessgraph_core::models::organization::{
    CreateOrganization, Organization, UpdateOrganization,
};
use accessgraph_core::repository::{OrganizationRepository, PaginatedResult, Pagination};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::Rng;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

const SELECT_ORGANIZATION: &str = "SELECT meta::id(id) AS record_id, * \
                                   FROM type::record('organization', $id)";

/// Generate an organization API key (32 random bytes, URL-safe base64).
pub fn generate_api_key() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct OrganizationRow {
    record_id: String,
    name: String,
    api_key: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrganizationRow {
    fn try_into_organization(self) -> Result<Organization, DbError> {
        Ok(Organization {
            id: parse_uuid(&self.record_id, "organization")?,
            name: self.name,
            api_key: self.api_key,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Organization repository.
#[derive(Clone)]
pub struct SurrealOrganizationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealOrganizationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> OrganizationRepository for SurrealOrganizationRepository<C> {
    async fn create(&self, input: CreateOrganization) -> GraphResult<Organization> {
        let id = Uuid::new_v4();

        let query = format!(
            "CREATE type::record('organization', $id) SET \
             name = $name, api_key = $api_key; \
             {SELECT_ORGANIZATION};"
        );

        let result = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("name", input.name.clone()))
            .bind(("api_key", generate_api_key()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::on_write(e, "organization", &input.name))?;

        let rows: Vec<OrganizationRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("organization", id))?;
        Ok(row.try_into_organization()?)
    }

    async fn get_by_id(&self, id: Uuid) -> GraphResult<Organization> {
        let mut result = self
            .db
            .query(SELECT_ORGANIZATION)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("organization", id))?;
        Ok(row.try_into_organization()?)
    }

    async fn get_by_api_key(&self, api_key: &str) -> GraphResult<Organization> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM organization \
                 WHERE api_key = $api_key LIMIT 1",
            )
            .bind(("api_key", api_key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("organization", "<api key>"))?;
        Ok(row.try_into_organization()?)
    }

    async fn update(&self, id: Uuid, input: UpdateOrganization) -> GraphResult<Organization> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('organization', $id) SET {}; {SELECT_ORGANIZATION};",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<OrganizationRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("organization", id))?;
        Ok(row.try_into_organization()?)
    }

    async fn rotate_api_key(&self, id: Uuid) -> GraphResult<Organization> {
        let mut result = self
            .db
            .query(format!(
                "UPDATE type::record('organization', $id) SET \
                 api_key = $api_key, updated_at = time::now(); \
                 {SELECT_ORGANIZATION};"
            ))
            .bind(("id", id.to_string()))
            .bind(("api_key", generate_api_key()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<OrganizationRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("organization", id))?;
        Ok(row.try_into_organization()?)
    }

    async fn delete(&self, id: Uuid) -> GraphResult<()> {
        // Owned entities first, then the organization record itself.
        let mut result = self
            .db
            .query(
                "DELETE resource WHERE org_id = $id; \
                 DELETE user WHERE org_id = $id; \
                 DELETE role WHERE org_id = $id; \
                 DELETE group WHERE org_id = $id; \
                 DELETE policy WHERE org_id = $id; \
                 DELETE type::record('organization', $id) RETURN BEFORE;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let removed: Vec<surrealdb_types::Value> = result.take(5).map_err(DbError::from)?;
        if removed.is_empty() {
            return Err(DbError::not_found("organization", id).into());
        }
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> GraphResult<PaginatedResult<Organization>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM organization GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM organization \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_organization())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
