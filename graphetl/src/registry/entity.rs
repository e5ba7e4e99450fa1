use std::fmt;
use std::sync::Arc;

use graphetl_config::shared::{DatabaseConfig, NodeSourceConfig, RelationshipConfig};

use crate::bail;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::schema::FieldIndexMap;
use crate::source::SourceAdapter;
use crate::storage::TableHandle;
use crate::types::{CanonicalField, CanonicalSchema};

/// A source of a node type that was described successfully.
#[derive(Clone)]
pub struct DiscoveredSource {
    pub source_name: String,
    pub table: String,
    /// Resolved fields in source order.
    pub fields: Vec<CanonicalField>,
    pub id_key: Option<String>,
    pub uri_key: Option<String>,
    pub adapter: Arc<dyn SourceAdapter>,
}

impl DiscoveredSource {
    pub fn new(
        table_config: &NodeSourceConfig,
        fields: Vec<CanonicalField>,
        adapter: Arc<dyn SourceAdapter>,
    ) -> Self {
        Self {
            source_name: adapter.source_name().to_string(),
            table: table_config.table.clone(),
            fields,
            id_key: table_config.id_key.clone(),
            uri_key: table_config.uri_key.clone(),
            adapter,
        }
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.name.clone()).collect()
    }
}

impl fmt::Debug for DiscoveredSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveredSource")
            .field("source_name", &self.source_name)
            .field("table", &self.table)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// A source dropped while discovering a node type.
#[derive(Debug, Clone)]
pub struct DroppedSource {
    pub source_name: String,
    pub table: String,
    pub error: EtlError,
}

/// A source bound to its node table.
///
/// The field index map is computed from the discovery snapshot and assumes the source layout does
/// not change while streaming. `id_key` and `uri_key` are carried but not interpreted.
#[derive(Clone)]
pub struct SourceBinding {
    pub source_name: String,
    pub table: String,
    pub field_names: Vec<String>,
    pub field_index_map: FieldIndexMap,
    pub id_key: Option<String>,
    pub uri_key: Option<String>,
    pub adapter: Arc<dyn SourceAdapter>,
}

impl fmt::Debug for SourceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceBinding")
            .field("source_name", &self.source_name)
            .field("table", &self.table)
            .field("field_names", &self.field_names)
            .field("field_index_map", &self.field_index_map)
            .finish_non_exhaustive()
    }
}

/// A node type and everything known about it during one build.
#[derive(Debug, Clone)]
pub struct EntityType {
    pub label: String,
    pub schema: CanonicalSchema,
    /// Sources that passed discovery, in configuration order.
    pub discovered: Vec<DiscoveredSource>,
    pub dropped: Vec<DroppedSource>,
    /// Set once the destination table exists.
    pub table: Option<TableHandle>,
    pub bindings: Vec<SourceBinding>,
    /// Why the destination table could not be created.
    pub failure: Option<EtlError>,
}

impl EntityType {
    pub fn new(label: impl Into<String>, schema: CanonicalSchema) -> Self {
        Self {
            label: label.into(),
            schema,
            discovered: Vec::new(),
            dropped: Vec::new(),
            table: None,
            bindings: Vec::new(),
            failure: None,
        }
    }

    /// Returns whether no source survived discovery.
    pub fn is_skipped(&self) -> bool {
        self.discovered.is_empty()
    }
}

/// A relationship type. Building relationship tables is not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipType {
    pub label: String,
    pub start_label: Option<String>,
    pub end_label: Option<String>,
}

impl RelationshipType {
    /// Always fails with [`ErrorKind::UnsupportedOperation`].
    pub fn new(label: &str, config: &RelationshipConfig) -> EtlResult<RelationshipType> {
        bail!(
            ErrorKind::UnsupportedOperation,
            "Relationship types are not supported",
            format!(
                "relationship `{label}` ({} -> {})",
                config.start.as_deref().unwrap_or("?"),
                config.end.as_deref().unwrap_or("?")
            )
        );
    }
}

/// Registries of one build, owned by the caller.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub database: DatabaseConfig,
    /// Node types in configuration order.
    pub entities: Vec<EntityType>,
    /// Relationship labels with the error that prevented building them.
    pub relationships: Vec<(String, EtlError)>,
}

impl BuildContext {
    pub fn new(database: DatabaseConfig) -> Self {
        Self {
            database,
            entities: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn entity(&self, label: &str) -> Option<&EntityType> {
        self.entities.iter().find(|entity| entity.label == label)
    }
}
