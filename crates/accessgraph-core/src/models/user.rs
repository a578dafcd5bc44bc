//! User domain model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub org_id: Uuid,
    pub username: String,
    /// Unique within the organization.
    pub identifier: String,
    /// Free-form key-value properties.
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// Mirrors `Role::users`.
    #[serde(default)]
    pub roles: BTreeSet<Uuid>,
    /// Mirrors `Group::users`.
    #[serde(default)]
    pub groups: BTreeSet<Uuid>,
    /// Mirrors `Policy::users`.
    #[serde(default)]
    pub policies: BTreeSet<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub org_id: Uuid,
    pub username: String,
    pub identifier: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    /// Replaces the whole property map.
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
}
