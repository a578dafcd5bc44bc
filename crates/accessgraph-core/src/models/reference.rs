//! Entity kinds, reference slots and the relation table.
//!
//! The graph is stored as an adjacency list: each endpoint of an edge holds
//! the other endpoint's id in one of its reference sets. A
//! [`ReferenceSlot`] names one such set (owner kind + field), and a
//! [`Relation`] pairs the two slots that must always agree.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GraphError, GraphResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Resource,
    User,
    Role,
    Group,
    Policy,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Resource,
        EntityKind::User,
        EntityKind::Role,
        EntityKind::Group,
        EntityKind::Policy,
    ];

    /// Collection name, also used as the SurrealDB table name.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Resource => "resource",
            EntityKind::User => "user",
            EntityKind::Role => "role",
            EntityKind::Group => "group",
            EntityKind::Policy => "policy",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| GraphError::invalid_input(format!("unknown entity kind: {s}")))
    }
}

/// A typed pointer to one entity inside an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn user(id: Uuid) -> Self {
        Self::new(EntityKind::User, id)
    }

    pub fn role(id: Uuid) -> Self {
        Self::new(EntityKind::Role, id)
    }

    pub fn group(id: Uuid) -> Self {
        Self::new(EntityKind::Group, id)
    }

    pub fn policy(id: Uuid) -> Self {
        Self::new(EntityKind::Policy, id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// One id-set field on one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceSlot {
    UserRoles,
    UserGroups,
    UserPolicies,
    RoleUsers,
    RoleGroups,
    GroupUsers,
    GroupRoles,
    GroupPolicies,
    PolicyUsers,
    PolicyGroups,
}

impl ReferenceSlot {
    pub const ALL: [ReferenceSlot; 10] = [
        ReferenceSlot::UserRoles,
        ReferenceSlot::UserGroups,
        ReferenceSlot::UserPolicies,
        ReferenceSlot::RoleUsers,
        ReferenceSlot::RoleGroups,
        ReferenceSlot::GroupUsers,
        ReferenceSlot::GroupRoles,
        ReferenceSlot::GroupPolicies,
        ReferenceSlot::PolicyUsers,
        ReferenceSlot::PolicyGroups,
    ];

    /// The entity kind that stores this set.
    pub fn owner(self) -> EntityKind {
        match self {
            ReferenceSlot::UserRoles | ReferenceSlot::UserGroups | ReferenceSlot::UserPolicies => {
                EntityKind::User
            }
            ReferenceSlot::RoleUsers | ReferenceSlot::RoleGroups => EntityKind::Role,
            ReferenceSlot::GroupUsers | ReferenceSlot::GroupRoles | ReferenceSlot::GroupPolicies => {
                EntityKind::Group
            }
            ReferenceSlot::PolicyUsers | ReferenceSlot::PolicyGroups => EntityKind::Policy,
        }
    }

    /// The entity kind whose ids the set holds.
    pub fn target(self) -> EntityKind {
        match self {
            ReferenceSlot::RoleUsers | ReferenceSlot::GroupUsers | ReferenceSlot::PolicyUsers => {
                EntityKind::User
            }
            ReferenceSlot::UserRoles | ReferenceSlot::GroupRoles => EntityKind::Role,
            ReferenceSlot::UserGroups | ReferenceSlot::RoleGroups | ReferenceSlot::PolicyGroups => {
                EntityKind::Group
            }
            ReferenceSlot::UserPolicies | ReferenceSlot::GroupPolicies => EntityKind::Policy,
        }
    }

    /// Field name on the owning document.
    pub fn field(self) -> &'static str {
        match self.target() {
            EntityKind::User => "users",
            EntityKind::Role => "roles",
            EntityKind::Group => "groups",
            EntityKind::Policy => "policies",
            EntityKind::Resource => unreachable!("resources are never referenced by id"),
        }
    }

    pub fn of(owner: EntityKind, target: EntityKind) -> Option<ReferenceSlot> {
        ReferenceSlot::ALL
            .into_iter()
            .find(|s| s.owner() == owner && s.target() == target)
    }

    /// The slot on the other endpoint that must mirror this one.
    pub fn inverse(self) -> ReferenceSlot {
        match self {
            ReferenceSlot::UserRoles => ReferenceSlot::RoleUsers,
            ReferenceSlot::UserGroups => ReferenceSlot::GroupUsers,
            ReferenceSlot::UserPolicies => ReferenceSlot::PolicyUsers,
            ReferenceSlot::RoleUsers => ReferenceSlot::UserRoles,
            ReferenceSlot::RoleGroups => ReferenceSlot::GroupRoles,
            ReferenceSlot::GroupUsers => ReferenceSlot::UserGroups,
            ReferenceSlot::GroupRoles => ReferenceSlot::RoleGroups,
            ReferenceSlot::GroupPolicies => ReferenceSlot::PolicyGroups,
            ReferenceSlot::PolicyUsers => ReferenceSlot::UserPolicies,
            ReferenceSlot::PolicyGroups => ReferenceSlot::GroupPolicies,
        }
    }

    /// Every slot that can hold an id of `kind`.
    pub fn targeting(kind: EntityKind) -> impl Iterator<Item = ReferenceSlot> {
        ReferenceSlot::ALL
            .into_iter()
            .filter(move |s| s.target() == kind)
    }

    /// Every slot stored on documents of `kind`.
    pub fn owned_by(kind: EntityKind) -> impl Iterator<Item = ReferenceSlot> {
        ReferenceSlot::ALL
            .into_iter()
            .filter(move |s| s.owner() == kind)
    }
}

impl fmt::Display for ReferenceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner(), self.field())
    }
}

/// A supported bidirectional relation between two entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    UserRole,
    UserGroup,
    GroupRole,
    UserPolicy,
    GroupPolicy,
}

impl Relation {
    pub const ALL: [Relation; 5] = [
        Relation::UserRole,
        Relation::UserGroup,
        Relation::GroupRole,
        Relation::UserPolicy,
        Relation::GroupPolicy,
    ];

    /// Canonical `(left, right)` endpoint kinds.
    pub fn endpoints(self) -> (EntityKind, EntityKind) {
        match self {
            Relation::UserRole => (EntityKind::User, EntityKind::Role),
            Relation::UserGroup => (EntityKind::User, EntityKind::Group),
            Relation::GroupRole => (EntityKind::Group, EntityKind::Role),
            Relation::UserPolicy => (EntityKind::User, EntityKind::Policy),
            Relation::GroupPolicy => (EntityKind::Group, EntityKind::Policy),
        }
    }

    /// Relation between two kinds, in either order.
    pub fn between(a: EntityKind, b: EntityKind) -> Option<Relation> {
        Relation::ALL.into_iter().find(|r| {
            let (l, rt) = r.endpoints();
            (l == a && rt == b) || (l == b && rt == a)
        })
    }

    /// Slot on the left endpoint, holding right ids.
    pub fn left_slot(self) -> ReferenceSlot {
        let (l, r) = self.endpoints();
        match ReferenceSlot::of(l, r) {
            Some(slot) => slot,
            None => unreachable!("every relation has a left slot"),
        }
    }

    /// Slot on the right endpoint, holding left ids.
    pub fn right_slot(self) -> ReferenceSlot {
        self.left_slot().inverse()
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (l, r) = self.endpoints();
        write!(f, "{l}<->{r}")
    }
}

/// One edge, normalized so that `left` has the relation's left kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub relation: Relation,
    pub left: Uuid,
    pub right: Uuid,
}

impl Edge {
    /// Normalize two endpoints into an edge. Fails with `InvalidInput` when
    /// no relation connects the two kinds.
    pub fn between(a: EntityRef, b: EntityRef) -> GraphResult<Edge> {
        let relation = Relation::between(a.kind, b.kind).ok_or_else(|| {
            GraphError::invalid_input(format!("no relation between {} and {}", a.kind, b.kind))
        })?;
        let (left_kind, _) = relation.endpoints();
        let (left, right) = if a.kind == left_kind {
            (a.id, b.id)
        } else {
            (b.id, a.id)
        };
        Ok(Edge {
            relation,
            left,
            right,
        })
    }

    pub fn left_ref(&self) -> EntityRef {
        EntityRef::new(self.relation.endpoints().0, self.left)
    }

    pub fn right_ref(&self) -> EntityRef {
        EntityRef::new(self.relation.endpoints().1, self.right)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.left_ref(), self.right_ref())
    }
}

/// Incremental edit of one entity's reference sets. Each listed entity is
/// linked to or unlinked from the patched entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePatch {
    #[serde(default)]
    pub added: Vec<EntityRef>,
    #[serde(default)]
    pub removed: Vec<EntityRef>,
}
