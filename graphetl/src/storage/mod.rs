//! Destination storage of node tables.
//!
//! [`Storage`] creates tables and appends complete records to them. [`duckdb::DuckDbStorage`]
//! writes the graph database file, [`memory::MemoryStorage`] keeps everything in memory.

mod base;
pub mod duckdb;
pub mod memory;

pub use base::*;
