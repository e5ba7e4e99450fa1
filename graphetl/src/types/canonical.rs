use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Storage type of a node table column.
///
/// Ordering is only used to report conflicting types deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
    /// ASCII byte string holding at most `capacity` bytes.
    FixedString(usize),
    Bool,
    /// Timestamp with microsecond precision.
    Time64,
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalType::Int8 => f.write_str("int8"),
            CanonicalType::Int16 => f.write_str("int16"),
            CanonicalType::Int32 => f.write_str("int32"),
            CanonicalType::Int64 => f.write_str("int64"),
            CanonicalType::UInt8 => f.write_str("uint8"),
            CanonicalType::UInt16 => f.write_str("uint16"),
            CanonicalType::UInt32 => f.write_str("uint32"),
            CanonicalType::UInt64 => f.write_str("uint64"),
            CanonicalType::Float16 => f.write_str("float16"),
            CanonicalType::Float32 => f.write_str("float32"),
            CanonicalType::Float64 => f.write_str("float64"),
            CanonicalType::FixedString(capacity) => write!(f, "string({capacity})"),
            CanonicalType::Bool => f.write_str("bool"),
            CanonicalType::Time64 => f.write_str("time64"),
        }
    }
}

impl Serialize for CanonicalType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Error returned when a canonical type name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown canonical type `{0}`")]
pub struct ParseCanonicalTypeError(pub String);

impl CanonicalType {
    /// Parses a type name, using `default_capacity` for a bare `string`.
    pub fn parse_with_capacity(
        name: &str,
        default_capacity: usize,
    ) -> Result<CanonicalType, ParseCanonicalTypeError> {
        let normalized = name.trim().to_ascii_lowercase();
        let typ = match normalized.as_str() {
            "int8" => CanonicalType::Int8,
            "int16" => CanonicalType::Int16,
            "int32" => CanonicalType::Int32,
            "int64" => CanonicalType::Int64,
            "uint8" => CanonicalType::UInt8,
            "uint16" => CanonicalType::UInt16,
            "uint32" => CanonicalType::UInt32,
            "uint64" => CanonicalType::UInt64,
            "float16" => CanonicalType::Float16,
            "float32" => CanonicalType::Float32,
            "float64" => CanonicalType::Float64,
            "bool" => CanonicalType::Bool,
            "time64" => CanonicalType::Time64,
            "string" => CanonicalType::FixedString(default_capacity),
            other => {
                let capacity = other
                    .strip_prefix("string(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .and_then(|capacity| capacity.trim().parse::<usize>().ok())
                    .filter(|capacity| *capacity > 0)
                    .ok_or_else(|| ParseCanonicalTypeError(name.to_string()))?;
                CanonicalType::FixedString(capacity)
            }
        };

        Ok(typ)
    }
}

impl FromStr for CanonicalType {
    type Err = ParseCanonicalTypeError;

    /// Parses the names produced by `Display`. A bare `string` is rejected, it needs a capacity.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("string") {
            return Err(ParseCanonicalTypeError(s.to_string()));
        }

        CanonicalType::parse_with_capacity(s, 0)
    }
}

/// A named, typed column of a node table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalField {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: CanonicalType,
}

impl CanonicalField {
    pub fn new(name: impl Into<String>, typ: CanonicalType) -> Self {
        Self {
            name: name.into(),
            typ,
        }
    }
}

/// Ordered columns of one node table. Field names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CanonicalSchema {
    fields: Vec<CanonicalField>,
}

impl CanonicalSchema {
    /// Wraps already merged fields. Uniqueness is established by the harmonizer.
    pub fn new(fields: Vec<CanonicalField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[CanonicalField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the position of the field called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&CanonicalField> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse_agree() {
        let types = [
            CanonicalType::Int8,
            CanonicalType::UInt64,
            CanonicalType::Float16,
            CanonicalType::FixedString(32),
            CanonicalType::Bool,
            CanonicalType::Time64,
        ];

        for typ in types {
            assert_eq!(typ.to_string().parse::<CanonicalType>(), Ok(typ));
        }
    }

    #[test]
    fn test_bare_string_takes_default_capacity() {
        assert_eq!(
            CanonicalType::parse_with_capacity("STRING", 64),
            Ok(CanonicalType::FixedString(64))
        );
        assert!("string".parse::<CanonicalType>().is_err());
        assert!("string(0)".parse::<CanonicalType>().is_err());
        assert!("decimal".parse::<CanonicalType>().is_err());
    }

    #[test]
    fn test_schema_lookup() {
        let schema = CanonicalSchema::new(vec![
            CanonicalField::new("id", CanonicalType::Int32),
            CanonicalField::new("name", CanonicalType::FixedString(8)),
        ]);

        assert_eq!(schema.position("name"), Some(1));
        assert_eq!(schema.position("age"), None);
        assert_eq!(
            serde_json::to_string(&schema).unwrap(),
            r#"[{"name":"id","type":"int32"},{"name":"name","type":"string(8)"}]"#
        );
    }
}
