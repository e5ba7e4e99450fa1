#![allow(dead_code)]

use graphetl::builder::GraphBuilder;
use graphetl::source::SourceRegistry;
use graphetl::source::memory::{MemorySource, MemorySourceConnector, MemoryTable};
use graphetl::types::{Cell, FieldValue, TableRecord};
use graphetl_config::shared::{BuildSettings, GraphConfig, ValidatedGraphConfig};

/// Two sources holding people, the second with an extra `age` column.
pub const PERSON_GRAPH: &str = r#"
Database:
  name: people
  version: "1.0"
Sources:
  A:
    source type: memory
  B:
    source type: memory
Nodes:
  Person:
    sources:
      A:
        table: people
        id_key: id
      B:
        table: persons
        id_key: id
"#;

/// Parses and validates a graph document.
pub fn graph_config(yaml: &str) -> ValidatedGraphConfig {
    let config: GraphConfig = serde_yaml::from_str(yaml).unwrap();
    ValidatedGraphConfig::try_from(config).unwrap()
}

/// Settings with small batches so that several flushes happen per source.
pub fn test_settings() -> BuildSettings {
    let mut settings = BuildSettings::default();
    settings.max_workers = 2;
    settings.batch.max_size = 2;
    settings
}

pub fn builder(yaml: &str, connector: MemorySourceConnector) -> GraphBuilder {
    builder_with(yaml, connector, test_settings())
}

pub fn builder_with(
    yaml: &str,
    connector: MemorySourceConnector,
    settings: BuildSettings,
) -> GraphBuilder {
    let sources = SourceRegistry::new().with(connector);
    GraphBuilder::new(graph_config(yaml), settings, sources).unwrap()
}

pub fn people_a() -> MemoryTable {
    MemoryTable::new([("id", "LONG"), ("name", "VAR_STRING")])
        .with_row([Cell::I32(7), Cell::from("Ana")])
        .with_row([Cell::I32(8), Cell::from("Bo")])
}

pub fn people_b() -> MemoryTable {
    MemoryTable::new([("id", "LONG"), ("name", "VAR_STRING"), ("age", "LONG")])
        .with_row([Cell::I32(9), Cell::from("Cy"), Cell::I32(41)])
}

/// Connector serving `people_a` as source `A` and `people_b` as source `B`.
pub fn person_connector() -> MemorySourceConnector {
    MemorySourceConnector::new()
        .with_source("A", MemorySource::new().with_table("people", people_a()))
        .with_source("B", MemorySource::new().with_table("persons", people_b()))
}

/// Returns the record whose first value is `id`.
pub fn record_with_id(records: &[TableRecord], id: i32) -> &TableRecord {
    records
        .iter()
        .find(|record| record.values().first() == Some(&FieldValue::I32(id)))
        .unwrap_or_else(|| panic!("no record with id {id}"))
}
