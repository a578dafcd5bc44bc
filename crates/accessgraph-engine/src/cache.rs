//! Decision caching with TTL and per-organization generations.
//!
//! [`MokaDecisionCache`] implements the [`DecisionCache`] boundary on top of
//! Moka's async cache. Each entry carries its own expiry so that callers can
//! pass a TTL per `set`; Moka's `time_to_live` bounds every entry from above.
//!
//! [`Generations`] holds one counter per organization. Cache keys embed the
//! counter read at lookup time, so bumping it after a graph mutation makes
//! every older decision for that organization unreachable without touching
//! any other organization's entries.

use std::time::{Duration, Instant};

use accessgraph_core::cache::{CacheKey, DecisionCache};
use accessgraph_core::error::GraphResult;
use dashmap::DashMap;
use moka::future::Cache;
use uuid::Uuid;

use crate::config::CacheConfig;

#[derive(Debug, Clone, Copy)]
struct CachedDecision {
    allowed: bool,
    expires_at: Instant,
}

/// In-process decision cache backed by Moka.
#[derive(Clone)]
pub struct MokaDecisionCache {
    cache: Cache<CacheKey, CachedDecision>,
}

impl std::fmt::Debug for MokaDecisionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaDecisionCache")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl MokaDecisionCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl())
            .build();
        Self { cache }
    }

    /// Approximate number of live entries.
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl DecisionCache for MokaDecisionCache {
    async fn get(&self, key: &CacheKey) -> GraphResult<Option<bool>> {
        match self.cache.get(key).await {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.allowed)),
            Some(_) => {
                self.cache.invalidate(key).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: CacheKey, allowed: bool, ttl: Duration) -> GraphResult<()> {
        let entry = CachedDecision {
            allowed,
            expires_at: Instant::now() + ttl,
        };
        self.cache.insert(key, entry).await;
        Ok(())
    }

    async fn flush_all(&self) -> GraphResult<()> {
        self.cache.invalidate_all();
        Ok(())
    }
}

/// Per-organization mutation counters.
#[derive(Debug, Default)]
pub struct Generations {
    counters: DashMap<Uuid, u64>,
}

impl Generations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, org_id: Uuid) -> u64 {
        self.counters.get(&org_id).map(|g| *g).unwrap_or(0)
    }

    /// Advance the organization's generation and return the new value.
    pub fn bump(&self, org_id: Uuid) -> u64 {
        let mut entry = self.counters.entry(org_id).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Forget a deleted organization.
    pub fn remove(&self, org_id: Uuid) {
        self.counters.remove(&org_id);
    }
}
