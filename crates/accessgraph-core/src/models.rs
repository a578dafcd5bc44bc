//! Domain models for the tenant authorization graph.
//!
//! Every entity lives inside exactly one [`organization::Organization`].
//! Links between entities are stored as id sets on both endpoints; see
//! [`reference`] for the relation table that keeps them symmetric.

pub mod group;
pub mod organization;
pub mod permission;
pub mod policy;
pub mod reference;
pub mod resource;
pub mod role;
pub mod summary;
pub mod user;
