//! Coordination primitives shared by the discovery and ingestion workers.
//!
//! The [`shutdown`] module carries both the build-wide cancellation requested by the operator and
//! the per node type abort raised after a destination failure.

pub mod shutdown;
