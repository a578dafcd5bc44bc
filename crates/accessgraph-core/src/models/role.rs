//! Role domain model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::permission::Permission;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Role {
    pub id: Uuid,
    pub org_id: Uuid,
    pub identifier: String,
    pub name: String,
    /// Mirrors `User::roles`.
    #[serde(default)]
    pub users: BTreeSet<Uuid>,
    /// Mirrors `Group::roles`.
    #[serde(default)]
    pub groups: BTreeSet<Uuid>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn grants(&self, resource: &str, action: &str) -> bool {
        self.permissions.iter().any(|p| p.matches(resource, action))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub org_id: Uuid,
    pub identifier: String,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateRole {
    pub name: Option<String>,
}

/// Incremental edit of a role's permission list.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolePermissionPatch {
    #[serde(default)]
    pub added: Vec<Permission>,
    #[serde(default)]
    pub removed: Vec<Permission>,
}
