//! Engine configuration.

use std::time::Duration;

use serde::Deserialize;

/// How graph mutations invalidate cached decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationStrategy {
    /// Bump the organization's generation; older keys become unreachable.
    #[default]
    Generation,
    /// Drop every cached decision for every organization.
    FlushAll,
}

/// Configuration for the decision cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Maximum number of cached decisions.
    pub max_capacity: u64,
    /// Lifetime of a cached decision in milliseconds (default: 30 s).
    pub ttl_ms: u64,
    pub invalidation: InvalidationStrategy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: 100_000,
            ttl_ms: 30_000,
            invalidation: InvalidationStrategy::Generation,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Configuration for the graph engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deadline for each store call in milliseconds (default: 5 s).
    pub store_timeout_ms: u64,
    /// Deadline for each tuple-engine call in milliseconds (default: 5 s).
    pub tuple_timeout_ms: u64,
    /// Extra attempts for the second write of an edge (default: 2).
    pub edge_retry_attempts: u32,
    /// Linear backoff step between edge retries in milliseconds.
    pub edge_retry_backoff_ms: u64,
    /// Namespace used for relationship checks that do not name one.
    pub default_namespace: String,
    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: 5_000,
            tuple_timeout_ms: 5_000,
            edge_retry_attempts: 2,
            edge_retry_backoff_ms: 50,
            default_namespace: "default".into(),
            cache: CacheConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn tuple_timeout(&self) -> Duration {
        Duration::from_millis(self.tuple_timeout_ms)
    }

    pub fn edge_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.edge_retry_backoff_ms)
    }
}

/// Connection settings for an Ory Keto deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KetoConfig {
    /// Base URL of the read API (e.g., `http://127.0.0.1:4466`).
    pub read_url: String,
    /// Base URL of the write (admin) API (e.g., `http://127.0.0.1:4467`).
    pub write_url: String,
    /// HTTP request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Page size used when listing tuples.
    pub page_size: u32,
}

impl Default for KetoConfig {
    fn default() -> Self {
        Self {
            read_url: "http://127.0.0.1:4466".into(),
            write_url: "http://127.0.0.1:4467".into(),
            request_timeout_ms: 5_000,
            page_size: 100,
        }
    }
}

impl KetoConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
