//! SurrealDB implementation of [`PolicyRepository`].

use accessgraph_core::error::GraphResult;
use accessgraph_core::models::policy::{CreatePolicy, Policy, PolicyContent, UpdatePolicy};
use accessgraph_core::repository::{PaginatedResult, Pagination, PolicyRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{
    count_records, delete_record, from_json, guarded_update, parse_id_set, parse_uuid, to_json,
};
use crate::error::DbError;

const SELECT_POLICY: &str = "SELECT meta::id(id) AS record_id, * \
                             FROM type::record('policy', $id) WHERE org_id = $org_id";

#[derive(Debug, SurrealValue)]
struct PolicyRow {
    record_id: String,
    org_id: String,
    identifier: String,
    name: String,
    active_version: Option<String>,
    contents: serde_json::Value,
    users: Vec<String>,
    groups: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PolicyRow {
    fn try_into_policy(self) -> Result<Policy, DbError> {
        Ok(Policy {
            id: parse_uuid(&self.record_id, "policy")?,
            org_id: parse_uuid(&self.org_id, "organization")?,
            identifier: self.identifier,
            name: self.name,
            active_version: self.active_version,
            contents: from_json(self.contents)?,
            users: parse_id_set(self.users)?,
            groups: parse_id_set(self.groups)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Policy repository.
#[derive(Clone)]
pub struct SurrealPolicyRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPolicyRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> PolicyRepository for SurrealPolicyRepository<C> {
    async fn create(&self, input: CreatePolicy) -> GraphResult<Policy> {
        let id = Uuid::new_v4();
        let contents: Vec<PolicyContent> = input
            .contents
            .into_iter()
            .map(|c| c.into_content())
            .collect();

        let query = format!(
            "CREATE type::record('policy', $id) SET \
             org_id = $org_id, identifier = $identifier, name = $name, \
             active_version = $active_version, contents = $contents; \
             {SELECT_POLICY};"
        );

        let result = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("org_id", input.org_id.to_string()))
            .bind(("identifier", input.identifier.clone()))
            .bind(("name", input.name))
            .bind(("active_version", input.active_version))
            .bind(("contents", to_json(&contents)?))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::on_write(e, "policy", &input.identifier))?;

        let rows: Vec<PolicyRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("policy", id))?;
        Ok(row.try_into_policy()?)
    }

    async fn get_by_id(&self, org_id: Uuid, id: Uuid) -> GraphResult<Policy> {
        let mut result = self
            .db
            .query(SELECT_POLICY)
            .bind(("id", id.to_string()))
            .bind(("org_id", org_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PolicyRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("policy", id))?;
        Ok(row.try_into_policy()?)
    }

    async fn get_by_identifier(&self, org_id: Uuid, identifier: &str) -> GraphResult<Policy> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM policy \
                 WHERE org_id = $org_id AND identifier = $identifier LIMIT 1",
            )
            .bind(("org_id", org_id.to_string()))
            .bind(("identifier", identifier.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PolicyRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("policy", identifier))?;
        Ok(row.try_into_policy()?)
    }

    async fn update(&self, org_id: Uuid, id: Uuid, input: UpdatePolicy) -> GraphResult<Policy> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        match &input.active_version {
            Some(Some(_)) => sets.push("active_version = $active_version"),
            Some(None) => sets.push("active_version = NONE"),
            None => {}
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('policy', $id) SET {} \
             WHERE org_id = $org_id; {SELECT_POLICY};",
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
        if let Some(Some(version)) = input.active_version {
            builder = builder.bind(("active_version", version));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<PolicyRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("policy", id))?;
        Ok(row.try_into_policy()?)
    }

    async fn delete(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        Ok(delete_record(&self.db, "policy", org_id, id).await?)
    }

    async fn list(
        &self,
        org_id: Uuid,
        pagination: Pagination,
    ) -> GraphResult<PaginatedResult<Policy>> {
        let total = count_records(&self.db, "policy", org_id).await?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM policy \
                 WHERE org_id = $org_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("org_id", org_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PolicyRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_policy())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn add_content(
        &self,
        org_id: Uuid,
        id: Uuid,
        content: PolicyContent,
    ) -> GraphResult<bool> {
        let version = content.version.clone();
        Ok(guarded_update(
            &self.db,
            "policy",
            "UPDATE type::record('policy', $id) SET \
             contents += $content, updated_at = time::now() \
             WHERE org_id = $org_id AND contents.*.version CONTAINSNOT $version",
            org_id,
            id,
            vec![("content", to_json(&content)?), ("version", version.into())],
        )
        .await?)
    }

    async fn remove_content(&self, org_id: Uuid, id: Uuid, content_id: Uuid) -> GraphResult<bool> {
        Ok(guarded_update(
            &self.db,
            "policy",
            "UPDATE type::record('policy', $id) SET \
             contents = contents[WHERE id != $content_id], \
             updated_at = time::now() \
             WHERE org_id = $org_id AND contents.*.id CONTAINS $content_id",
            org_id,
            id,
            vec![("content_id", content_id.to_string().into())],
        )
        .await?)
    }
}
