//! Policy domain model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    pub id: Uuid,
    pub org_id: Uuid,
    pub identifier: String,
    pub name: String,
    /// Version tag of the content currently in force, if any.
    pub active_version: Option<String>,
    #[serde(default)]
    pub contents: Vec<PolicyContent>,
    /// Mirrors `User::policies`.
    #[serde(default)]
    pub users: BTreeSet<Uuid>,
    /// Mirrors `Group::policies`.
    #[serde(default)]
    pub groups: BTreeSet<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    pub fn content_by_version(&self, version: &str) -> Option<&PolicyContent> {
        self.contents.iter().find(|c| c.version == version)
    }

    pub fn active_content(&self) -> Option<&PolicyContent> {
        self.active_version
            .as_deref()
            .and_then(|v| self.content_by_version(v))
    }
}

/// One independently addressable version of a policy document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyContent {
    pub id: Uuid,
    pub version: String,
    pub document: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatePolicyContent {
    pub version: String,
    pub document: String,
}

impl CreatePolicyContent {
    pub fn new(version: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            document: document.into(),
        }
    }

    /// Assign a fresh id.
    pub fn into_content(self) -> PolicyContent {
        PolicyContent {
            id: Uuid::new_v4(),
            version: self.version,
            document: self.document,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePolicy {
    pub org_id: Uuid,
    pub identifier: String,
    pub name: String,
    pub active_version: Option<String>,
    #[serde(default)]
    pub contents: Vec<CreatePolicyContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePolicy {
    pub name: Option<String>,
    /// `Some(Some(v))` = activate `v`, `Some(None)` = clear, `None` = no change.
    pub active_version: Option<Option<String>>,
}

/// Incremental edit of a policy's content versions.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PolicyContentPatch {
    #[serde(default)]
    pub added: Vec<CreatePolicyContent>,
    /// Ids of content entries to remove.
    #[serde(default)]
    pub removed: Vec<Uuid>,
}
