//! Deadlines for store, tuple-engine and cache calls.

use std::time::Duration;

use accessgraph_core::error::{GraphError, GraphResult};

/// Run `fut` with a deadline. An elapsed deadline is a `Timeout`.
pub(crate) async fn within<T>(
    limit: Duration,
    operation: &str,
    fut: impl Future<Output = GraphResult<T>>,
) -> GraphResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(GraphError::Timeout {
            operation: operation.to_string(),
        }),
    }
}
