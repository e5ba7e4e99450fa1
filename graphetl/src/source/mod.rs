//! Readers of relational sources.
//!
//! A [`SourceConnector`] turns a configured source into a [`SourceAdapter`], which describes a
//! table's columns and streams its rows. Connectors are looked up by the configured
//! `source type` in a [`SourceRegistry`].

mod base;
pub mod memory;
pub mod mysql;
mod registry;

pub use base::*;
pub use registry::*;
