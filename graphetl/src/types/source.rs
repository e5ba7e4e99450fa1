use crate::types::Cell;

/// A column described by a source: its name and the source-native type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceField {
    pub name: String,
    pub native_type: String,
}

impl SourceField {
    pub fn new(name: impl Into<String>, native_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native_type: native_type.into(),
        }
    }
}

/// One row read from a source, aligned with the fields the source described.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    values: Vec<Cell>,
}

impl SourceRow {
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Cell> {
        self.values
    }
}
