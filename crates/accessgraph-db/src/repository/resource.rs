//! SurrealDB implementation of [`ResourceRepository`].

use accessgraph_core::error::GraphResult;
use accessgraph_core::models::resource::{Action, CreateResource, Resource, UpdateResource};
use accessgraph_core::repository::{PaginatedResult, Pagination, ResourceRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{count_records, delete_record, from_json, guarded_update, parse_uuid, to_json};
use crate::error::DbError;

const SELECT_RESOURCE: &str = "SELECT meta::id(id) AS record_id, * \
                               FROM type::record('resource', $id) WHERE org_id = $org_id";

#[derive(Debug, SurrealValue)]
struct ResourceRow {
    record_id: String,
    org_id: String,
    identifier: String,
    name: String,
    actions: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ResourceRow {
    fn try_into_resource(self) -> Result<Resource, DbError> {
        Ok(Resource {
            id: parse_uuid(&self.record_id, "resource")?,
            org_id: parse_uuid(&self.org_id, "organization")?,
            identifier: self.identifier,
            name: self.name,
            actions: from_json(self.actions)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Resource repository.
#[derive(Clone)]
pub struct SurrealResourceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealResourceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ResourceRepository for SurrealResourceRepository<C> {
    async fn create(&self, input: CreateResource) -> GraphResult<Resource> {
        let id = Uuid::new_v4();
        let actions: Vec<Action> = input
            .actions
            .into_iter()
            .map(|a| a.into_action())
            .collect();

        let query = format!(
            "CREATE type::record('resource', $id) SET \
             org_id = $org_id, identifier = $identifier, name = $name, \
             actions = $actions; \
             {SELECT_RESOURCE};"
        );

        let result = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("org_id", input.org_id.to_string()))
            .bind(("identifier", input.identifier.clone()))
            .bind(("name", input.name))
            .bind(("actions", to_json(&actions)?))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::on_write(e, "resource", &input.identifier))?;

        let rows: Vec<ResourceRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("resource", id))?;
        Ok(row.try_into_resource()?)
    }

    async fn get_by_id(&self, org_id: Uuid, id: Uuid) -> GraphResult<Resource> {
        let mut result = self
            .db
            .query(SELECT_RESOURCE)
            .bind(("id", id.to_string()))
            .bind(("org_id", org_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("resource", id))?;
        Ok(row.try_into_resource()?)
    }

    async fn get_by_identifier(&self, org_id: Uuid, identifier: &str) -> GraphResult<Resource> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM resource \
                 WHERE org_id = $org_id AND identifier = $identifier LIMIT 1",
            )
            .bind(("org_id", org_id.to_string()))
            .bind(("identifier", identifier.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("resource", identifier))?;
        Ok(row.try_into_resource()?)
    }

    async fn update(
        &self,
        org_id: Uuid,
        id: Uuid,
        input: UpdateResource,
    ) -> GraphResult<Resource> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('resource', $id) SET {} \
             WHERE org_id = $org_id; {SELECT_RESOURCE};",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("org_id", org_id.to_string()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ResourceRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("resource", id))?;
        Ok(row.try_into_resource()?)
    }

    async fn delete(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        Ok(delete_record(&self.db, "resource", org_id, id).await?)
    }

    async fn list(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> GraphResult<PaginatedResult<Resource>> {
        let total = count_records(&self.db, "resource", org_id).await?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM resource \
                 WHERE org_id = $org_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("org_id", org_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_resource())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn add_action(&self, org_id: Uuid, id: Uuid, action: Action) -> GraphResult<bool> {
        let identifier = action.identifier.clone();
        Ok(guarded_update(
            &self.db,
            "resource",
            "UPDATE type::record('resource', $id) SET \
             actions += $action, updated_at = time::now() \
             WHERE org_id = $org_id AND actions.*.identifier CONTAINSNOT $identifier",
            org_id,
            id,
            vec![
                ("action", to_json(&action)?),
                ("identifier", identifier.into()),
            ],
        )
        .await?)
    }

    async fn remove_action(
        &self,
        org_id: Uuid,
        id: Uuid,
        action_identifier: &str,
    ) -> GraphResult<bool> {
        Ok(guarded_update(
            &self.db,
            "resource",
            "UPDATE type::record('resource', $id) SET \
             actions = actions[WHERE identifier != $identifier], \
             updated_at = time::now() \
             WHERE org_id = $org_id AND actions.*.identifier CONTAINS $identifier",
            org_id,
            id,
            vec![("identifier", action_identifier.into())],
        )
        .await?)
    }
}
