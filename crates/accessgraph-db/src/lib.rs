//! Access Graph Database — store backends for the authorization graph.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - SurrealDB repositories bundled as [`SurrealGraphStore`]
//! - An in-process backend, [`MemoryGraphStore`], used by tests and
//!   embedded deployments

mod connection;
mod error;
pub mod memory;
pub mod repository;
mod schema;
mod store;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use memory::MemoryGraphStore;
pub use schema::{run_migrations, schema_v1};
pub use store::SurrealGraphStore;
