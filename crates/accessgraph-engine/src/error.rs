//! Tuple-engine client errors.

use accessgraph_core::error::GraphError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TupleError {
    #[error("tuple engine request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("tuple engine returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid tuple engine response: {0}")]
    Decode(String),

    #[error("tuple engine timed out: {0}")]
    Timeout(String),
}

impl From<TupleError> for GraphError {
    fn from(err: TupleError) -> Self {
        match err {
            TupleError::Timeout(operation) => GraphError::Timeout { operation },
            TupleError::Transport(e) if e.is_timeout() => GraphError::Timeout {
                operation: e.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            TupleError::Status { status: 400, body } => {
                GraphError::invalid_input(format!("tuple engine rejected the request: {body}"))
            }
            other => GraphError::System(other.to_string()),
        }
    }
}
