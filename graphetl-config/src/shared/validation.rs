use std::fmt;

use thiserror::Error;

use crate::shared::IdentityMode;

/// A single problem found while validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("`Database.name` must not be empty")]
    EmptyDatabaseName,

    #[error("`Database.version` must not be empty")]
    EmptyDatabaseVersion,

    #[error("{what} `{value}` is empty or contains quote, slash or control characters")]
    InvalidIdentifier { what: &'static str, value: String },

    #[error("source `{source_name}` has an empty `source type`")]
    EmptySourceType { source_name: String },

    #[error("no node types are declared under `Nodes`")]
    NoNodeTypes,

    #[error("node type `{label}` declares no sources")]
    NodeWithoutSources { label: String },

    #[error("node type `{label}` references source `{source_name}` which is not declared under `Sources`")]
    UndeclaredSource { label: String, source_name: String },

    #[error("node type `{label}` has an empty table name for source `{source_name}`")]
    EmptyTableName { label: String, source_name: String },

    #[error("`max_workers` cannot be zero")]
    MaxWorkersZero,

    #[error("`string_capacity` cannot be zero")]
    StringCapacityZero,

    #[error("identity mode `{0}` is not supported, rows can only be appended")]
    UnsupportedIdentityMode(IdentityMode),

    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}

/// Every [`ValidationError`] found in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_inner(self) -> Vec<ValidationError> {
        self.errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.errors.len();
        write!(
            f,
            "configuration has {count} problem{}",
            if count == 1 { "" } else { "s" }
        )?;

        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}
