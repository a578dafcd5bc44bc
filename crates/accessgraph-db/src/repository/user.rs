//! SurrealDB implementation of [`UserRepository`].

use accessgraph_core::error::GraphResult;
use accessgraph_core::models::user::{CreateUser, UpdateUser, User};
use accessgraph_core::repository::{PaginatedResult, Pagination, UserRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{count_records, delete_record, from_json, parse_id_set, parse_uuid};
use crate::error::DbError;

const SELECT_USER: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('user', $id) \
                           WHERE org_id = $org_id";

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    org_id: String,
    identifier: String,
    username: String,
    properties: serde_json::Value,
    roles: Vec<String>,
    groups: Vec<String>,
    policies: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        Ok(User {
            id: parse_uuid(&self.record_id, "user")?,
            org_id: parse_uuid(&self.org_id, "organization")?,
            username: self.username,
            identifier: self.identifier,
            properties: from_json(self.properties)?,
            roles: parse_id_set(self.roles)?,
            groups: parse_id_set(self.groups)?,
            policies: parse_id_set(self.policies)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> GraphResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let query = format!(
            "CREATE type::record('user', $id) SET \
             org_id = $org_id, identifier = $identifier, \
             username = $username, properties = $properties; \
             {SELECT_USER};"
        );

        let result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("org_id", input.org_id.to_string()))
            .bind(("identifier", input.identifier.clone()))
            .bind(("username", input.username))
            .bind(("properties", serde_json::Value::Object(input.properties)))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::on_write(e, "user", &input.identifier))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", &id_str))?;
        Ok(row.try_into_user()?)
    }

    async fn get_by_id(&self, org_id: Uuid, id: Uuid) -> GraphResult<User> {
        let mut result = self
            .db
            .query(SELECT_USER)
            .bind(("id", id.to_string()))
            .bind(("org_id", org_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", id))?;
        Ok(row.try_into_user()?)
    }

    async fn get_by_identifier(&self, org_id: Uuid, identifier: &str) -> GraphResult<User> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE org_id = $org_id AND identifier = $identifier LIMIT 1",
            )
            .bind(("org_id", org_id.to_string()))
            .bind(("identifier", identifier.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", identifier))?;
        Ok(row.try_into_user()?)
    }

    async fn update(&self, org_id: Uuid, id: Uuid, input: UpdateUser) -> GraphResult<User> {
        let mut sets = Vec::new();
        if input.username.is_some() {
            sets.push("username = $username");
        }
        if input.properties.is_some() {
            sets.push("properties = $properties");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {} \
             WHERE org_id = $org_id; {SELECT_USER};",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("org_id", org_id.to_string()));

        if let Some(username) = input.username {
            builder = builder.bind(("username", username));
        }
        if let Some(properties) = input.properties {
            builder = builder.bind(("properties", serde_json::Value::Object(properties)));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", id))?;
        Ok(row.try_into_user()?)
    }

    async fn delete(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        Ok(delete_record(&self.db, "user", org_id, id).await?)
    }

    async fn list(&self, org_id: Uuid, pagination: Pagination) -> GraphResult<PaginatedResult<User>> {
        let total = count_records(&self.db, "user", org_id).await?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE org_id = $org_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("org_id", org_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
