//! Resource domain model.
//!
//! Resources and their actions are leaf entities: nothing they own points
//! back at other entities. Roles refer to them by identifier through
//! [`Permission`](super::permission::Permission).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    pub id: Uuid,
    pub org_id: Uuid,
    /// Slug unique within the organization (e.g., `docs`).
    pub identifier: String,
    pub name: String,
    pub actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    pub fn action(&self, identifier: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.identifier == identifier)
    }

    pub fn has_action(&self, identifier: &str) -> bool {
        self.action(identifier).is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Action {
    pub id: Uuid,
    /// Unique within the owning resource (e.g., `read`).
    pub identifier: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResource {
    pub org_id: Uuid,
    pub identifier: String,
    pub name: String,
    #[serde(default)]
    pub actions: Vec<CreateAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateAction {
    pub identifier: String,
    pub name: String,
}

impl CreateAction {
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
        }
    }

    /// Assign a fresh id.
    pub fn into_action(self) -> Action {
        Action {
            id: Uuid::new_v4(),
            identifier: self.identifier,
            name: self.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateResource {
    pub name: Option<String>,
}

/// Incremental edit of a resource's action list.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourceActionPatch {
    #[serde(default)]
    pub added: Vec<CreateAction>,
    /// Identifiers of actions to remove.
    #[serde(default)]
    pub removed: Vec<String>,
}
