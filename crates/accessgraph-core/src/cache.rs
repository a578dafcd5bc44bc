//! Decision cache boundary.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GraphResult;

/// Which resolution path produced a cached decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionMode {
    Local,
    Relationship,
}

/// Identifies one cached check result.
///
/// `namespace` is the organization id or a caller-supplied API key;
/// `generation` is that namespace's mutation counter at lookup time, so a
/// bump makes every older key unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: String,
    pub generation: u64,
    pub mode: DecisionMode,
    pub subject: String,
    pub relation: String,
    pub object: String,
}

pub trait DecisionCache: Send + Sync + 'static {
    fn get(&self, key: &CacheKey) -> impl Future<Output = GraphResult<Option<bool>>> + Send;
    fn set(
        &self,
        key: CacheKey,
        allowed: bool,
        ttl: Duration,
    ) -> impl Future<Output = GraphResult<()>> + Send;
    fn flush_all(&self) -> impl Future<Output = GraphResult<()>> + Send;
}
