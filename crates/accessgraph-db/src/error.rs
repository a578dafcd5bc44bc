//! Database-specific error types and conversions.

use accessgraph_core::error::GraphError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Duplicate {entity}: {identifier}")]
    Duplicate { entity: String, identifier: String },
}

impl DbError {
    /// Classify a failed write. SurrealDB reports unique index violations
    /// as "Database index `...` already contains ...".
    pub(crate) fn on_write(err: surrealdb::Error, entity: &str, identifier: &str) -> Self {
        let message = err.to_string();
        if message.contains("already contains") {
            DbError::Duplicate {
                entity: entity.to_string(),
                identifier: identifier.to_string(),
            }
        } else {
            DbError::Query(message)
        }
    }

    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<DbError> for GraphError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => GraphError::NotFound { entity, id },
            DbError::Duplicate { entity, identifier } => {
                GraphError::AlreadyExists { entity, identifier }
            }
            other => GraphError::System(other.to_string()),
        }
    }
}
