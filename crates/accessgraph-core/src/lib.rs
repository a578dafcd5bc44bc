//! Access Graph Core — entity model, error taxonomy and the store,
//! tuple-engine and cache boundaries for the tenant authorization graph.
//!
//! This crate performs no I/O. Backends live in `accessgraph-db`; the
//! algorithms that keep the graph consistent live in `accessgraph-engine`.

pub mod cache;
pub mod error;
pub mod models;
pub mod repository;
pub mod tuple;
pub mod validation;

pub use error::{ErrorKind, GraphError, GraphResult};
