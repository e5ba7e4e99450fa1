use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::PathBuf;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::shared::{ValidationError, ValidationErrors};

/// Characters that may not appear in labels and table names.
const FORBIDDEN_IDENTIFIER_CHARS: &[char] = &['"', '`', '/', '\0'];

/// The graph database description document.
///
/// Top-level keys are capitalized as in the YAML document: `Database`, `Sources`, `Nodes`
/// and `Relationships`.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(rename = "Database")]
    pub database: DatabaseConfig,
    #[serde(rename = "Sources", default, deserialize_with = "null_as_empty")]
    pub sources: IndexMap<String, SourceConfig>,
    #[serde(rename = "Nodes", default, deserialize_with = "null_as_empty")]
    pub nodes: IndexMap<String, NodeConfig>,
    #[serde(rename = "Relationships", default, deserialize_with = "null_as_empty")]
    pub relationships: IndexMap<String, RelationshipConfig>,
}

/// Identity of the graph database being built.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    /// Accepts numbers too, since `version: 1.0` is a float in YAML.
    #[serde(deserialize_with = "string_or_number")]
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
}

impl DatabaseConfig {
    /// Returns the `{name}-{version}` stem used to name the output artifact.
    pub fn artifact_stem(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// A declared data source.
///
/// Only `source type` is interpreted here. Connection keys are read by the connector
/// registered for that kind; keys it does not know are kept in `options`.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(rename = "source type", alias = "source_type")]
    pub source_type: String,
    #[serde(rename = "database name", alias = "database_name", default)]
    pub database_name: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    #[serde(default)]
    pub socket: Option<PathBuf>,
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_yaml::Value>,
}

impl SourceConfig {
    /// Creates a source of the given kind with no connection details.
    pub fn new(source_type: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            database_name: None,
            host: None,
            port: None,
            user: None,
            password: None,
            socket: None,
            options: BTreeMap::new(),
        }
    }

    pub fn with_database_name(mut self, database_name: impl Into<String>) -> Self {
        self.database_name = Some(database_name.into());
        self
    }
}

/// A node type and the sources that hold its instances.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sources: IndexMap<String, NodeSourceConfig>,
}

/// Where a node type lives inside one source.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSourceConfig {
    pub table: String,
    #[serde(default)]
    pub id_key: Option<String>,
    #[serde(default)]
    pub uri_key: Option<String>,
}

impl NodeSourceConfig {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_key: None,
            uri_key: None,
        }
    }
}

/// A relationship type. Parsed so it can be reported, never ingested.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationshipConfig {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_yaml::Value>,
}

impl GraphConfig {
    /// Checks the whole document and returns every issue found.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        if self.database.name.trim().is_empty() {
            errors.push(ValidationError::EmptyDatabaseName);
        } else if !is_valid_identifier(&self.database.name) {
            errors.push(ValidationError::InvalidIdentifier {
                what: "database name",
                value: self.database.name.clone(),
            });
        }
        if self.database.version.trim().is_empty() {
            errors.push(ValidationError::EmptyDatabaseVersion);
        }

        for (name, source) in self.sources.iter() {
            if source.source_type.trim().is_empty() {
                errors.push(ValidationError::EmptySourceType {
                    source_name: name.to_string(),
                });
            }
        }

        if self.nodes.is_empty() {
            errors.push(ValidationError::NoNodeTypes);
        }

        for (label, node) in self.nodes.iter() {
            if !is_valid_identifier(label) {
                errors.push(ValidationError::InvalidIdentifier {
                    what: "node label",
                    value: label.to_string(),
                });
            }

            if node.sources.is_empty() {
                errors.push(ValidationError::NodeWithoutSources {
                    label: label.to_string(),
                });
            }

            for (source_name, binding) in node.sources.iter() {
                if !self.sources.contains_key(source_name) {
                    errors.push(ValidationError::UndeclaredSource {
                        label: label.to_string(),
                        source_name: source_name.to_string(),
                    });
                }

                if binding.table.trim().is_empty() {
                    errors.push(ValidationError::EmptyTableName {
                        label: label.to_string(),
                        source_name: source_name.to_string(),
                    });
                } else if !is_valid_identifier(&binding.table) {
                    errors.push(ValidationError::InvalidIdentifier {
                        what: "source table",
                        value: binding.table.clone(),
                    });
                }
            }
        }

        for (label, _) in self.relationships.iter() {
            if !is_valid_identifier(label) {
                errors.push(ValidationError::InvalidIdentifier {
                    what: "relationship label",
                    value: label.to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors::new(errors))
        }
    }
}

/// A [`GraphConfig`] that passed [`GraphConfig::validate`].
///
/// The builder only accepts this type, so nothing is connected or written for a document
/// with known problems.
#[derive(Debug, Clone)]
pub struct ValidatedGraphConfig(GraphConfig);

impl ValidatedGraphConfig {
    pub fn into_inner(self) -> GraphConfig {
        self.0
    }
}

impl TryFrom<GraphConfig> for ValidatedGraphConfig {
    type Error = ValidationErrors;

    fn try_from(config: GraphConfig) -> Result<Self, Self::Error> {
        config.validate()?;
        Ok(Self(config))
    }
}

impl Deref for ValidatedGraphConfig {
    type Target = GraphConfig;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn is_valid_identifier(value: &str) -> bool {
    !value.trim().is_empty()
        && !value
            .chars()
            .any(|c| FORBIDDEN_IDENTIFIER_CHARS.contains(&c) || c.is_control())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(value) => Ok(value),
        serde_yaml::Value::Number(value) => Ok(value.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string or a number, found {other:?}"
        ))),
    }
}

/// Reads an explicit `~` like a missing key.
fn null_as_empty<'de, D, V>(deserializer: D) -> Result<IndexMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    Ok(Option::<IndexMap<String, V>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
Database:
  name: comptox
  version: 0.1
  author: Jane Doe
Sources:
  chemicals:
    source type: mysql
    database name: chem_db
  assays:
    source type: mysql
    database name: assay_db
    host: db.internal
    port: 3307
Nodes:
  Chemical:
    sources:
      chemicals:
        table: chemicals
        id_key: chem_id
        uri_key: chem_uri
      assays:
        table: assay_chemicals
        id_key: id
        uri_key: uri
Relationships:
"#;

    #[test]
    fn test_parse_document() {
        let config: GraphConfig = serde_yaml::from_str(DOCUMENT).unwrap();

        assert_eq!(config.database.name, "comptox");
        assert_eq!(config.database.version, "0.1");
        assert_eq!(config.database.artifact_stem(), "comptox-0.1");
        assert_eq!(config.sources.len(), 2);

        let assays = config.sources.get("assays").unwrap();
        assert_eq!(assays.source_type, "mysql");
        assert_eq!(assays.database_name.as_deref(), Some("assay_db"));
        assert_eq!(assays.port, Some(3307));

        let chemical = config.nodes.get("Chemical").unwrap();
        let sources: Vec<_> = chemical.sources.keys().map(String::as_str).collect();
        assert_eq!(sources, vec!["chemicals", "assays"]);
        assert_eq!(
            chemical.sources.get("chemicals").unwrap().id_key.as_deref(),
            Some("chem_id")
        );
        assert!(config.relationships.is_empty());

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_collects_every_issue() {
        let document = r#"
Database:
  name: ""
  version: "1"
Sources:
  known:
    source type: mysql
Nodes:
  Person:
    sources:
      known:
        table: ""
      missing:
        table: people
  Empty:
    sources: {}
"#;
        let config: GraphConfig = serde_yaml::from_str(document).unwrap();
        let errors = config.validate().unwrap_err();

        assert!(errors.iter().any(|e| matches!(e, ValidationError::EmptyDatabaseName)));
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::EmptyTableName { label, source_name } if label == "Person" && source_name == "known"
        )));
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::UndeclaredSource { source_name, .. } if source_name == "missing"
        )));
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::NodeWithoutSources { label } if label == "Empty"
        )));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_quoted_labels_are_rejected() {
        let mut config: GraphConfig = serde_yaml::from_str(DOCUMENT).unwrap();
        let mut node = NodeConfig::default();
        node.sources
            .insert("chemicals".to_string(), NodeSourceConfig::new("chemicals"));
        config.nodes.insert("Bad\"Label".to_string(), node);

        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::InvalidIdentifier { what: "node label", .. }
        )));
    }

    #[test]
    fn test_document_order_is_kept() {
        let document = r#"
Database: {name: g, version: 1}
Sources:
  zeta: {source type: memory}
  alpha: {source type: memory}
Nodes:
  Zebra:
    sources: {zeta: {table: z}}
  Ant: {}
Relationships: ~
"#;
        let config: GraphConfig = serde_yaml::from_str(document).unwrap();

        let sources: Vec<_> = config.sources.keys().map(String::as_str).collect();
        assert_eq!(sources, vec!["zeta", "alpha"]);
        let labels: Vec<_> = config.nodes.keys().map(String::as_str).collect();
        assert_eq!(labels, vec!["Zebra", "Ant"]);
        assert!(config.relationships.is_empty());
    }

    #[test]
    fn test_null_node_sources_are_empty() {
        let document = "Database: {name: g, version: 1}\nNodes:\n  Lonely:\n    sources: ~\n";
        let config: GraphConfig = serde_yaml::from_str(document).unwrap();
        assert!(config.nodes.get("Lonely").unwrap().sources.is_empty());
    }

    #[test]
    fn test_validated_config_requires_valid_document() {
        let config: GraphConfig = serde_yaml::from_str(DOCUMENT).unwrap();
        let validated = ValidatedGraphConfig::try_from(config).unwrap();
        assert_eq!(validated.database.name, "comptox");

        let config: GraphConfig =
            serde_yaml::from_str("Database: {name: x, version: 1}\nNodes: {}\n").unwrap();
        assert!(ValidatedGraphConfig::try_from(config).is_err());
    }
}
