//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Reference sets are arrays of id strings;
//! uniqueness of identifiers is enforced per organization by indexes.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1: initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Organizations (global scope)
-- =======================================================================
DEFINE TABLE organization SCHEMAFULL;
DEFINE FIELD name ON TABLE organization TYPE string;
DEFINE FIELD api_key ON TABLE organization TYPE string;
DEFINE FIELD created_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE organization TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_organization_api_key ON TABLE organization \
    COLUMNS api_key UNIQUE;

-- =======================================================================
-- Resources (organization-scoped, actions embedded)
-- =======================================================================
DEFINE TABLE resource SCHEMAFULL;
DEFINE FIELD org_id ON TABLE resource TYPE string;
DEFINE FIELD identifier ON TABLE resource TYPE string;
DEFINE FIELD name ON TABLE resource TYPE string;
DEFINE FIELD actions ON TABLE resource TYPE array DEFAULT [];
DEFINE FIELD actions.* ON TABLE resource TYPE object;
DEFINE FIELD actions.*.id ON TABLE resource TYPE string;
DEFINE FIELD actions.*.identifier ON TABLE resource TYPE string;
DEFINE FIELD actions.*.name ON TABLE resource TYPE string;
DEFINE FIELD created_at ON TABLE resource TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE resource TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_resource_org_identifier ON TABLE resource \
    COLUMNS org_id, identifier UNIQUE;

-- =======================================================================
-- Users (organization-scoped)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD org_id ON TABLE user TYPE string;
DEFINE FIELD identifier ON TABLE user TYPE string;
DEFINE FIELD username ON TABLE user TYPE string;
DEFINE FIELD properties ON TABLE user TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD roles ON TABLE user TYPE array DEFAULT [];
DEFINE FIELD roles.* ON TABLE user TYPE string;
DEFINE FIELD groups ON TABLE user TYPE array DEFAULT [];
DEFINE FIELD groups.* ON TABLE user TYPE string;
DEFINE FIELD policies ON TABLE user TYPE array DEFAULT [];
DEFINE FIELD policies.* ON TABLE user TYPE string;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_org_identifier ON TABLE user \
    COLUMNS org_id, identifier UNIQUE;

-- =======================================================================
-- Roles (organization-scoped, permissions embedded)
-- =======================================================================
DEFINE TABLE role SCHEMAFULL;
DEFINE FIELD org_id ON TABLE role TYPE string;
DEFINE FIELD identifier ON TABLE role TYPE string;
DEFINE FIELD name ON TABLE role TYPE string;
DEFINE FIELD users ON TABLE role TYPE array DEFAULT [];
DEFINE FIELD users.* ON TABLE role TYPE string;
DEFINE FIELD groups ON TABLE role TYPE array DEFAULT [];
DEFINE FIELD groups.* ON TABLE role TYPE string;
DEFINE FIELD permissions ON TABLE role TYPE array DEFAULT [];
DEFINE FIELD permissions.* ON TABLE role TYPE object;
DEFINE FIELD permissions.*.resource ON TABLE role TYPE string;
DEFINE FIELD permissions.*.action ON TABLE role TYPE string;
DEFINE FIELD created_at ON TABLE role TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE role TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_role_org_identifier ON TABLE role \
    COLUMNS org_id, identifier UNIQUE;

-- =======================================================================
-- Groups (organization-scoped)
-- =======================================================================
DEFINE TABLE group SCHEMAFULL;
DEFINE FIELD org_id ON TABLE group TYPE string;
DEFINE FIELD identifier ON TABLE group TYPE string;
DEFINE FIELD name ON TABLE group TYPE string;
DEFINE FIELD users ON TABLE group TYPE array DEFAULT [];
DEFINE FIELD users.* ON TABLE group TYPE string;
DEFINE FIELD roles ON TABLE group TYPE array DEFAULT [];
DEFINE FIELD roles.* ON TABLE group TYPE string;
DEFINE FIELD policies ON TABLE group TYPE array DEFAULT [];
DEFINE FIELD policies.* ON TABLE group TYPE string;
DEFINE FIELD created_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_org_identifier ON TABLE group \
    COLUMNS org_id, identifier UNIQUE;

-- =======================================================================
-- Policies (organization-scoped, versioned contents embedded)
-- =======================================================================
DEFINE TABLE policy SCHEMAFULL;
DEFINE FIELD org_id ON TABLE policy TYPE string;
DEFINE FIELD identifier ON TABLE policy TYPE string;
DEFINE FIELD name ON TABLE policy TYPE string;
DEFINE FIELD active_version ON TABLE policy TYPE option<string>;
DEFINE FIELD contents ON TABLE policy TYPE array DEFAULT [];
DEFINE FIELD contents.* ON TABLE policy TYPE object;
DEFINE FIELD contents.*.id ON TABLE policy TYPE string;
DEFINE FIELD contents.*.version ON TABLE policy TYPE string;
DEFINE FIELD contents.*.document ON TABLE policy TYPE string;
DEFINE FIELD users ON TABLE policy TYPE array DEFAULT [];
DEFINE FIELD users.* ON TABLE policy TYPE string;
DEFINE FIELD groups ON TABLE policy TYPE array DEFAULT [];
DEFINE FIELD groups.* ON TABLE policy TYPE string;
DEFINE FIELD created_at ON TABLE policy TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE policy TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_policy_org_identifier ON TABLE policy \
    COLUMNS org_id, identifier UNIQUE;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_is_nonempty() {
        assert!(!SCHEMA_V1.is_empty());
    }

    #[test]
    fn every_entity_table_has_an_identifier_index() {
        for table in ["resource", "user", "role", "group", "policy"] {
            let index = format!("idx_{table}_org_identifier ON TABLE {table}");
            assert!(SCHEMA_V1.contains(&index), "missing index for {table}");
        }
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }
}
