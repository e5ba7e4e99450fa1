use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::{ValidationError, ValidationErrors};

/// How records from different sources relate to records already in a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
    /// Every source row becomes a new destination row.
    #[default]
    Append,
    /// Rows sharing `id_key`/`uri_key` values are merged into one.
    ///
    /// Accepted by the parser so documents can name it, rejected by validation.
    MergeByKey,
}

impl fmt::Display for IdentityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityMode::Append => f.write_str("append"),
            IdentityMode::MergeByKey => f.write_str("merge_by_key"),
        }
    }
}

/// Buffering between a source stream and its node table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchSettings {
    /// Records accumulated before one append to the node table.
    #[serde(default = "default_batch_max_size")]
    pub max_size: usize,
}

impl BatchSettings {
    pub const DEFAULT_MAX_SIZE: usize = 1000;
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_size: default_batch_max_size(),
        }
    }
}

/// Engine settings for one build.
///
/// Every field has a default, so an empty settings source yields a usable value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BuildSettings {
    /// Directory in which the output database file is written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Maximum number of (node type, source) pairs ingested concurrently.
    #[serde(default = "default_max_workers")]
    pub max_workers: u16,
    /// Capacity, in bytes, of fixed-capacity string columns.
    #[serde(default = "default_string_capacity")]
    pub string_capacity: usize,
    #[serde(default)]
    pub batch: BatchSettings,
    /// Maps source types missing from the type table to strings instead of dropping the source.
    #[serde(default)]
    pub unknown_types_as_string: bool,
    /// Extra or replacement entries for the type table, keyed by source type name.
    #[serde(default)]
    pub type_overrides: BTreeMap<String, String>,
    #[serde(default)]
    pub identity: IdentityMode,
    /// MySQL option file holding default credentials, `~/.my.cnf` when unset.
    #[serde(default)]
    pub mysql_option_file: Option<PathBuf>,
    /// Timeout for establishing a source connection, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl BuildSettings {
    pub const DEFAULT_MAX_WORKERS: u16 = 4;

    pub const DEFAULT_STRING_CAPACITY: usize = 256;

    pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

    /// Checks every setting and returns all issues found.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        if self.max_workers == 0 {
            errors.push(ValidationError::MaxWorkersZero);
        }
        if self.string_capacity == 0 {
            errors.push(ValidationError::StringCapacityZero);
        }
        if self.batch.max_size == 0 {
            errors.push(ValidationError::InvalidFieldValue {
                field: "batch.max_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }
        if self.identity != IdentityMode::Append {
            errors.push(ValidationError::UnsupportedIdentityMode(self.identity));
        }
        if self.connect_timeout_ms == 0 {
            errors.push(ValidationError::InvalidFieldValue {
                field: "connect_timeout_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors::new(errors))
        }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_workers: default_max_workers(),
            string_capacity: default_string_capacity(),
            batch: BatchSettings::default(),
            unknown_types_as_string: false,
            type_overrides: BTreeMap::new(),
            identity: IdentityMode::default(),
            mysql_option_file: None,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_workers() -> u16 {
    BuildSettings::DEFAULT_MAX_WORKERS
}

fn default_string_capacity() -> usize {
    BuildSettings::DEFAULT_STRING_CAPACITY
}

fn default_connect_timeout_ms() -> u64 {
    BuildSettings::DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_batch_max_size() -> usize {
    BatchSettings::DEFAULT_MAX_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = BuildSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.string_capacity, 256);
        assert_eq!(settings.batch.max_size, BatchSettings::DEFAULT_MAX_SIZE);
    }

    #[test]
    fn test_merge_identity_is_rejected() {
        let settings: BuildSettings = serde_yaml::from_str("identity: merge_by_key\n").unwrap();
        let errors = settings.validate().unwrap_err();
        assert_eq!(
            errors.into_inner(),
            vec![ValidationError::UnsupportedIdentityMode(
                IdentityMode::MergeByKey
            )]
        );
    }

    #[test]
    fn test_zero_values_are_reported_together() {
        let settings: BuildSettings =
            serde_yaml::from_str("max_workers: 0\nstring_capacity: 0\nbatch:\n  max_size: 0\n")
                .unwrap();
        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
