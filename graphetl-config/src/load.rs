use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::{BuildSettings, GraphConfig, ValidatedGraphConfig, ValidationErrors};

/// Prefix for environment variable overrides of [`BuildSettings`].
const ENV_PREFIX: &str = "GRAPHETL";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// The graph document could not be read.
    #[error("failed to read `{path}`: {source}")]
    Read { path: PathBuf, source: io::Error },

    /// The graph document is not valid YAML or does not have the expected shape.
    #[error("failed to parse `{path}`: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// A settings file existed but could not be parsed.
    #[error("failed to load settings from `{path}`: {source}")]
    SettingsFile {
        path: PathBuf,
        source: rust_cli_config::ConfigError,
    },

    /// Environment variable overrides could not be merged.
    #[error("failed to build settings: {0}")]
    Builder(#[source] rust_cli_config::ConfigError),

    /// The settings were merged but could not be deserialized.
    #[error("failed to deserialize settings: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),

    /// The loaded configuration is inconsistent.
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
}

/// Reads a graph document from a YAML file without validating it.
pub fn load_graph_config(path: &Path) -> Result<GraphConfig, LoadConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LoadConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_yaml::from_str(&contents).map_err(|source| LoadConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and validates a graph document.
pub fn load_validated_graph_config(path: &Path) -> Result<ValidatedGraphConfig, LoadConfigError> {
    let config = load_graph_config(path)?;
    Ok(ValidatedGraphConfig::try_from(config)?)
}

/// Loads [`BuildSettings`] from an optional file and `GRAPHETL_`-prefixed environment variables.
///
/// Environment variables take precedence over the file. Nested keys use double underscores
/// (`GRAPHETL_BATCH__MAX_SIZE`). The result is validated before it is returned.
pub fn load_build_settings(path: Option<&Path>) -> Result<BuildSettings, LoadConfigError> {
    let mut builder = rust_cli_config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(rust_cli_config::File::from(path.to_path_buf()));
        builder
            .clone()
            .build()
            .map_err(|source| LoadConfigError::SettingsFile {
                path: path.to_path_buf(),
                source,
            })?;
    }

    let environment_source = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true);

    let settings = builder
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::Builder)?
        .try_deserialize::<BuildSettings>()
        .map_err(LoadConfigError::Deserialization)?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_load_graph_config_reports_missing_file() {
        let err = load_graph_config(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, LoadConfigError::Read { .. }));
    }

    #[test]
    fn test_load_graph_config_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Database: [not, a, mapping]").unwrap();

        let err = load_graph_config(file.path()).unwrap_err();
        assert!(matches!(err, LoadConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_validated_graph_config_rejects_invalid_documents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Database: {{name: g, version: 1}}\nNodes: {{}}").unwrap();

        let err = load_validated_graph_config(file.path()).unwrap_err();
        assert!(matches!(err, LoadConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_build_settings_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "max_workers: 2\nstring_capacity: 64\nbatch:\n  max_size: 10\ntype_overrides:\n  DATE: string"
        )
        .unwrap();

        let settings = load_build_settings(Some(file.path())).unwrap();
        assert_eq!(settings.max_workers, 2);
        assert_eq!(settings.string_capacity, 64);
        assert_eq!(settings.batch.max_size, 10);
        assert_eq!(
            settings.type_overrides.get("date").or(settings.type_overrides.get("DATE")),
            Some(&"string".to_string())
        );
    }
}
