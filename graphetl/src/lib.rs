//! Builds typed node tables of a graph database from heterogeneous relational sources.
//!
//! A build runs in two phases. Discovery describes every bound source, resolves native column
//! types to [`types::CanonicalType`]s and merges the per-source layouts of each node type into one
//! canonical schema, failing on conflicting field types. Ingestion then streams every source into
//! its node table on a bounded worker pool, coercing values field by field and appending one row
//! per completed record.
//!
//! [`builder::GraphBuilder`] drives both phases and returns a [`report::BuildReport`].

pub mod builder;
pub mod concurrency;
pub mod conversions;
pub mod error;
pub mod ingestion;
mod macros;
pub mod metrics;
pub mod registry;
pub mod report;
pub mod schema;
pub mod source;
pub mod storage;
pub mod types;
