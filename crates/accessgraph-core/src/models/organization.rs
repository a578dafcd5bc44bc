//! Organization domain model.
//!
//! Organizations are the tenant root. Resources, users, roles, groups and
//! policies are owned by exactly one organization and never exist outside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    /// Opaque immutable key.
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// Rotatable secret used by callers to address the organization.
    pub api_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrganization {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateOrganization {
    pub name: Option<String>,
}
