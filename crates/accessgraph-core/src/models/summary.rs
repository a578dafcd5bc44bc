//! Summarized entity used when rendering linked references.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::reference::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub id: Uuid,
    pub kind: EntityKind,
    pub identifier: String,
    /// Display name (username for users).
    pub name: String,
}
