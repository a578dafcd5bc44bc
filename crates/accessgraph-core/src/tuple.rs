//! Relationship-tuple engine boundary.
//!
//! The external engine owns its own relationship graph and is authoritative
//! for relationship-mode checks. Only the three operations below are
//! consumed; nothing here models the engine's traversal semantics.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GraphResult;

/// The subject of a relation tuple: a plain id or a subject set
/// (`namespace:object#relation`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subject {
    Id(String),
    Set {
        namespace: String,
        object: String,
        relation: String,
    },
}

impl Subject {
    /// Parse `namespace:object#relation` into a subject set; anything else
    /// is a plain subject id.
    pub fn parse(raw: &str) -> Subject {
        if let Some((namespace, rest)) = raw.split_once(':')
            && let Some((object, relation)) = rest.split_once('#')
            && !namespace.is_empty()
            && !object.is_empty()
            && !relation.is_empty()
        {
            return Subject::Set {
                namespace: namespace.to_string(),
                object: object.to_string(),
                relation: relation.to_string(),
            };
        }
        Subject::Id(raw.to_string())
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Id(id) => f.write_str(id),
            Subject::Set {
                namespace,
                object,
                relation,
            } => write!(f, "{namespace}:{object}#{relation}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationTuple {
    pub namespace: String,
    pub object: String,
    pub relation: String,
    pub subject: Subject,
}

impl RelationTuple {
    pub fn new(
        namespace: impl Into<String>,
        object: impl Into<String>,
        relation: impl Into<String>,
        subject: Subject,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            object: object.into(),
            relation: relation.into(),
            subject,
        }
    }
}

impl fmt::Display for RelationTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}#{}@{}",
            self.namespace, self.object, self.relation, self.subject
        )
    }
}

/// Filter for listing tuples. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleQuery {
    pub namespace: Option<String>,
    pub object: Option<String>,
    pub relation: Option<String>,
    pub subject: Option<Subject>,
}

impl TupleQuery {
    pub fn matches(&self, tuple: &RelationTuple) -> bool {
        self.namespace.as_ref().is_none_or(|n| *n == tuple.namespace)
            && self.object.as_ref().is_none_or(|o| *o == tuple.object)
            && self.relation.as_ref().is_none_or(|r| *r == tuple.relation)
            && self.subject.as_ref().is_none_or(|s| *s == tuple.subject)
    }
}

pub trait TupleEngine: Send + Sync + 'static {
    fn write_tuple(&self, tuple: RelationTuple) -> impl Future<Output = GraphResult<()>> + Send;
    fn check_tuple(&self, tuple: &RelationTuple)
    -> impl Future<Output = GraphResult<bool>> + Send;
    fn list_tuples(
        &self,
        query: &TupleQuery,
    ) -> impl Future<Output = GraphResult<Vec<RelationTuple>>> + Send;
}
