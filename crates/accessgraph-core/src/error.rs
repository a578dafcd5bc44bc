//! Error types for the authorization graph.
//!
//! [`GraphError`] carries context for logs and callers; [`ErrorKind`] is the
//! stable taxonomy that the transport layer maps to status codes.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity} with identifier {identifier}")]
    AlreadyExists { entity: String, identifier: String },

    #[error("System error: {0}")]
    System(String),

    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },
}

/// The error taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    AlreadyExists,
    SystemError,
    Unauthorized,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::SystemError => "system_error",
            ErrorKind::Unauthorized => "unauthorized",
        };
        f.write_str(s)
    }
}

impl GraphError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        GraphError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        GraphError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity: impl Into<String>, identifier: impl Into<String>) -> Self {
        GraphError::AlreadyExists {
            entity: entity.into(),
            identifier: identifier.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::InvalidInput { .. } => ErrorKind::InvalidInput,
            GraphError::NotFound { .. } => ErrorKind::NotFound,
            GraphError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            GraphError::System(_) | GraphError::Timeout { .. } => ErrorKind::SystemError,
            GraphError::Unauthorized { .. } => ErrorKind::Unauthorized,
        }
    }

    /// Store and external-service failures may succeed on a later attempt.
    /// Every other kind is a property of the request itself.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::SystemError
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NotFound { .. })
    }
}

pub type GraphResult<T> = Result<T, GraphError>;
