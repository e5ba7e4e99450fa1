//! The table registry: node types, their sources and their destination tables.
//!
//! [`discovery`] describes and merges every source of every node type. Only once that barrier
//! passes does [`materialize`] create the destination tables and bind each source to its table
//! through a field index map.

pub mod discovery;
mod entity;
pub mod materialize;

pub use entity::*;
