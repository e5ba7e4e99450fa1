//! Configuration for graph database builds.
//!
//! Two inputs are handled here: the graph document describing the database, its sources and
//! node types ([`shared::GraphConfig`]), and the engine settings ([`shared::BuildSettings`]).
//! Both are validated before a build starts.

mod load;
pub mod shared;

pub use load::{LoadConfigError, load_build_settings, load_graph_config, load_validated_graph_config};
