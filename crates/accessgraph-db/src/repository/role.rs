//! SurrealDB implementation of [`RoleRepository`].
//!
//! Permissions are embedded on the role as `{ resource, action }` objects
//! keyed by identifiers, so stripping a resource or action is a single
//! org-wide UPDATE.

use accessgraph_core::error::GraphResult;
use accessgraph_core::models::permission::Permission;
use accessgraph_core::models::role::{CreateRole, Role, UpdateRole};
use accessgraph_core::repository::{PaginatedResult, Pagination, RoleRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{
    bulk_update, count_records, delete_record, from_json, guarded_update, parse_id_set,
    parse_uuid, to_json,
};
use crate::error::DbError;

const SELECT_ROLE: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('role', $id) \
                           WHERE org_id = $org_id";

#[derive(Debug, SurrealValue)]
struct RoleRow {
    record_id: String,
    org_id: String,
    identifier: String,
    name: String,
    users: Vec<String>,
    groups: Vec<String>,
    permissions: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRow {
    fn try_into_role(self) -> Result<Role, DbError> {
        Ok(Role {
            id: parse_uuid(&self.record_id, "role")?,
            org_id: parse_uuid(&self.org_id, "organization")?,
            identifier: self.identifier,
            name: self.name,
            users: parse_id_set(self.users)?,
            groups: parse_id_set(self.groups)?,
            permissions: from_json(self.permissions)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Role repository.
#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn create(&self, input: CreateRole) -> GraphResult<Role> {
        let id = Uuid::new_v4();

        let mut permissions = input.permissions;
        permissions.sort();
        permissions.dedup();

        let query = format!(
            "CREATE type::record('role', $id) SET \
             org_id = $org_id, identifier = $identifier, name = $name, \
             permissions = $permissions; \
             {SELECT_ROLE};"
        );

        let result = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("org_id", input.org_id.to_string()))
            .bind(("identifier", input.identifier.clone()))
            .bind(("name", input.name))
            .bind(("permissions", to_json(&permissions)?))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::on_write(e, "role", &input.identifier))?;

        let rows: Vec<RoleRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("role", id))?;
        Ok(row.try_into_role()?)
    }

    async fn get_by_id(&self, org_id: Uuid, id: Uuid) -> GraphResult<Role> {
        let mut result = self
            .db
            .query(SELECT_ROLE)
            .bind(("id", id.to_string()))
            .bind(("org_id", org_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("role", id))?;
        Ok(row.try_into_role()?)
    }

    async fn get_by_identifier(&self, org_id: Uuid, identifier: &str) -> GraphResult<Role> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE org_id = $org_id AND identifier = $identifier LIMIT 1",
            )
            .bind(("org_id", org_id.to_string()))
            .bind(("identifier", identifier.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("role", identifier))?;
        Ok(row.try_into_role()?)
    }

    async fn update(&self, org_id: Uuid, id: Uuid, input: UpdateRole) -> GraphResult<Role> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('role', $id) SET {} \
             WHERE org_id = $org_id; {SELECT_ROLE};",
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

        let rows: Vec<RoleRow> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("role", id))?;
        Ok(row.try_into_role()?)
    }

    async fn delete(&self, org_id: Uuid, id: Uuid) -> GraphResult<()> {
        Ok(delete_record(&self.db, "role", org_id, id).await?)
    }

    async fn list(&self, org_id: Uuid, pagination: Pagination) -> GraphResult<PaginatedResult<Role>> {
        let total = count_records(&self.db, "role", org_id).await?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE org_id = $org_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("org_id", org_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_role())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn add_permission(
        &self,
        org_id: Uuid,
        id: Uuid,
        permission: Permission,
    ) -> GraphResult<bool> {
        Ok(guarded_update(
            &self.db,
            "role",
            "UPDATE type::record('role', $id) SET \
             permissions += $permission, updated_at = time::now() \
             WHERE org_id = $org_id AND permissions CONTAINSNOT $permission",
            org_id,
            id,
            vec![("permission", to_json(&permission)?)],
        )
        .await?)
    }

    async fn remove_permission(
        &self,
        org_id: Uuid,
        id: Uuid,
        permission: &Permission,
    ) -> GraphResult<bool> {
        Ok(guarded_update(
            &self.db,
            "role",
            "UPDATE type::record('role', $id) SET \
             permissions -= $permission, updated_at = time::now() \
             WHERE org_id = $org_id AND permissions CONTAINS $permission",
            org_id,
            id,
            vec![("permission", to_json(permission)?)],
        )
        .await?)
    }

    async fn remove_permissions_for_resource(
        &self,
        org_id: Uuid,
        resource_identifier: &str,
    ) -> GraphResult<u64> {
        Ok(bulk_update(
            &self.db,
            "UPDATE role SET \
             permissions = permissions[WHERE resource != $resource], \
             updated_at = time::now() \
             WHERE org_id = $org_id AND permissions.*.resource CONTAINS $resource",
            org_id,
            vec![("resource", resource_identifier.into())],
        )
        .await?)
    }

    async fn remove_permissions_for_action(
        &self,
        org_id: Uuid,
        resource_identifier: &str,
        action_identifier: &str,
    ) -> GraphResult<u64> {
        let permission = Permission::new(resource_identifier, action_identifier);
        Ok(bulk_update(
            &self.db,
            "UPDATE role SET \
             permissions -= $permission, updated_at = time::now() \
             WHERE org_id = $org_id AND permissions CONTAINS $permission",
            org_id,
            vec![("permission", to_json(&permission)?)],
        )
        .await?)
    }
}
