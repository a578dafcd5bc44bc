//! Group domain model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A set of users that share roles and policies.
///
/// Users reach a group's roles through exactly one level of indirection;
/// groups do not nest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: Uuid,
    pub org_id: Uuid,
    pub identifier: String,
    pub name: String,
    /// Mirrors `User::groups`.
    #[serde(default)]
    pub users: BTreeSet<Uuid>,
    /// Mirrors `Role::groups`.
    #[serde(default)]
    pub roles: BTreeSet<Uuid>,
    /// Mirrors `Policy::groups`.
    #[serde(default)]
    pub policies: BTreeSet<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroup {
    pub org_id: Uuid,
    pub identifier: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateGroup {
    pub name: Option<String>,
}
