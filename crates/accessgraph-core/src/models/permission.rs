//! Permission domain model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A grant of one action on one resource, held in a role's permission list.
///
/// Both halves are identifiers, not ids, so a permission reads the same way
/// a check request does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    /// Identifier of the resource (e.g., `docs`).
    pub resource: String,
    /// Identifier of the action within that resource (e.g., `read`).
    pub action: String,
}

impl Permission {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    pub fn matches(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}
