//! SurrealDB implementation of [`GroupRepository`].

use accessgraph_core::error::GraphResult;
use accessgraph_core::models::group::{CreateGroup, Group, UpdateGroup};
use accessgraph_core::repository::{GroupRepository, PaginatedResult, Pagination};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{count_records, delete_record, parse_id_set, parse_uuid};
use crate::error::DbError;

const SELECT_GROUP: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('group', $id) \
                            WHERE org_id = $org_id";

#[derive(Debug, SurrealValue)]
struct GroupRow {
    record_id: String,
    org_id: String,
    identifier: String,
    name: String,
    users: Vec<String>,
    roles: Vec<String>,
    policies: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    fn try_into_group(self) -> Result<Group, DbError> {
        Ok(Group {
            id: parse_uuid(&self.record_id, "group")?,
            org_id: parse_uuid(&self.org_id, "organization")?,
            identifier: self.identifier,
            name: self.name,
            users: parse_id_set(self.users)?,
            roles: parse_id_set(self.roles)?,
            policies: parse_id_set(self.policies)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Group repository.
#[derive(Clone)]
pub struct SurrealGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> GroupRepository for SurrealGroupRepository<C> {
    async fn create(&self, input: CreateGroup) -> GraphResult<Group> {
        let id = Uuid::new_v4();

        let query = format!(
            "CREATE type::record('group', $id) SET \
             org_id = $org_id, identifier = $identifier, name = $name; \
             {SELECT_GROUP};"
        );

        let result = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("org_id", input.org_id.to_string()))
            .bind(("identifier", input.identifier.clone()))
            .bind(("name", input.name))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::on_write(e, "group", &input.identifier))?;

        let rows: Vec<GroupRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group", id))?;
        Ok(row.try_into_group()?)
    }

    async fn get_by_id(&self, org_id: Uuid, id: Uuid) -> GraphResult<Group> {
        let mut result = self
            .db
            .query(SELECT_GROUP)
            .bind(("id", id.to_string()))
            .bind(("org_id", org_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group", id))?;
        Ok(row.try_into_group()?)
    }

    async fn get_by_identifier(&self, org_id: Uuid, identifier: &str) -> GraphResult<Group> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM group \
                 WHERE org_id = $org_id AND identifier = $identifier LIMIT 1",
            )
            .bind(("org_id", org_id.to_string()))
            .bind(("identifier", identifier.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group", identifier))?;
        Ok(row.try_into_group()?)
    }

    async fn update(&self, org_id: Uuid, id: Uuid, input: UpdateGroup) -> GraphResult<Group> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('group', $id) SET {} \
             WHERE org_id = $org_id; {SELECT_GROUP};",
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

        let rows: Vec<GroupRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group", id))?;
        Ok(row.try_into_group()?)
    }

    async fn delete(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        Ok(delete_record(&self.db, "group", org_id, id).await?)
    }

    async fn list(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> GraphResult<PaginatedResult<Group>> {
        let total = count_records(&self.db, "group", org_id).await?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM group \
                 WHERE org_id = $org_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("org_id", org_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_group())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
