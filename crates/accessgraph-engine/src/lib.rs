//! Access Graph Engine — link maintenance, patch algebra, cascade deletion,
//! permission resolution and query projection over the tenant
//! authorization graph, plus the Keto client and the Moka decision cache.

pub mod cache;
pub mod cascade;
pub mod check;
pub mod config;
mod deadline;
pub mod error;
pub mod keto;
pub mod link;
pub mod patch;
pub mod projection;
pub mod service;

pub use cache::{Generations, MokaDecisionCache};
pub use check::{CheckOutcome, CheckRequest, DecisionSource};
pub use config::{CacheConfig, EngineConfig, InvalidationStrategy, KetoConfig};
pub use error::TupleError;
pub use keto::KetoClient;
pub use patch::PatchOutcome;
pub use service::AccessGraphService;
