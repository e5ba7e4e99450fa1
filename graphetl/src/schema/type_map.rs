use std::collections::HashMap;

use graphetl_config::shared::BuildSettings;
use thiserror::Error;

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::types::{CanonicalField, CanonicalType, SourceField};

/// Error returned when a native type has no canonical counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("native type `{native_type}` has no canonical mapping")]
pub struct UnknownTypeError {
    pub native_type: String,
}

impl From<UnknownTypeError> for EtlError {
    #[track_caller]
    fn from(err: UnknownTypeError) -> EtlError {
        etl_error!(
            ErrorKind::UnknownType,
            "Source type has no canonical mapping",
            err.to_string(),
            source: err
        )
    }
}

/// Maps source-native type names to [`CanonicalType`]s.
///
/// Names are matched case-insensitively with runs of whitespace collapsed, so `int24  unsigned`
/// and `INT24 UNSIGNED` are the same key.
#[derive(Debug, Clone)]
pub struct TypeMap {
    entries: HashMap<String, CanonicalType>,
    unknown_as: Option<CanonicalType>,
}

impl TypeMap {
    /// Creates a map without entries.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            unknown_as: None,
        }
    }

    /// Creates the default map for MySQL protocol type names.
    pub fn mysql(string_capacity: usize) -> Self {
        use CanonicalType::*;

        let string = FixedString(string_capacity);
        let defaults = [
            ("TINY", Int8),
            ("TINY UNSIGNED", UInt8),
            ("SHORT", Int16),
            ("SHORT UNSIGNED", UInt16),
            ("YEAR", Int16),
            ("LONG", Int32),
            ("LONG UNSIGNED", UInt32),
            ("INT24", Int32),
            ("INT24 UNSIGNED", UInt32),
            ("LONGLONG", Int64),
            ("LONGLONG UNSIGNED", UInt64),
            ("FLOAT", Float32),
            ("DOUBLE", Float64),
            ("DECIMAL", Float64),
            ("NEWDECIMAL", Float64),
            ("VARCHAR", string),
            ("VAR_STRING", string),
            ("STRING", string),
            ("ENUM", string),
            ("SET", string),
            ("JSON", string),
            ("TINY_BLOB", string),
            ("BLOB", string),
            ("MEDIUM_BLOB", string),
            ("LONG_BLOB", string),
            ("TIME", string),
            ("TIMESTAMP", Time64),
            ("DATETIME", Time64),
            ("DATE", Time64),
            ("BIT", Bool),
        ];

        let mut map = TypeMap::empty();
        for (native_type, typ) in defaults {
            map.insert(native_type, typ);
        }

        map
    }

    /// Creates the MySQL map adjusted by the build settings.
    ///
    /// Overrides replace or add entries; their values are canonical type names where a bare
    /// `string` takes the configured capacity.
    pub fn from_settings(settings: &BuildSettings) -> EtlResult<Self> {
        let mut map = TypeMap::mysql(settings.string_capacity);

        for (native_type, canonical) in &settings.type_overrides {
            let typ = CanonicalType::parse_with_capacity(canonical, settings.string_capacity)
                .map_err(|err| {
                    etl_error!(
                        ErrorKind::ConfigError,
                        "Invalid type override",
                        format!("`{native_type}`: {err}"),
                        source: err
                    )
                })?;
            map.insert(native_type, typ);
        }

        if settings.unknown_types_as_string {
            map = map.with_unknown_as(CanonicalType::FixedString(settings.string_capacity));
        }

        Ok(map)
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, native_type: &str, typ: CanonicalType) {
        self.entries.insert(normalize(native_type), typ);
    }

    /// Resolves every unmapped native type to `typ` instead of failing.
    pub fn with_unknown_as(mut self, typ: CanonicalType) -> Self {
        self.unknown_as = Some(typ);
        self
    }

    /// Returns the canonical type of `native_type`.
    pub fn resolve(&self, native_type: &str) -> Result<CanonicalType, UnknownTypeError> {
        self.entries
            .get(&normalize(native_type))
            .copied()
            .or(self.unknown_as)
            .ok_or_else(|| UnknownTypeError {
                native_type: native_type.to_string(),
            })
    }

    /// Resolves a described source layout, keeping its order.
    pub fn resolve_fields(&self, fields: &[SourceField]) -> EtlResult<Vec<CanonicalField>> {
        fields
            .iter()
            .map(|field| {
                let typ = self.resolve(&field.native_type).map_err(|err| {
                    etl_error!(
                        ErrorKind::UnknownType,
                        "Source type has no canonical mapping",
                        format!("field `{}`: {err}", field.name),
                        source: err
                    )
                })?;
                Ok(CanonicalField::new(field.name.clone(), typ))
            })
            .collect()
    }
}

fn normalize(native_type: &str) -> String {
    native_type
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use graphetl_mysql::types::protocol_type_name;

    use super::*;

    #[test]
    fn test_default_mysql_entries() {
        let map = TypeMap::mysql(256);

        assert_eq!(map.resolve("TINY"), Ok(CanonicalType::Int8));
        assert_eq!(map.resolve("TINY UNSIGNED"), Ok(CanonicalType::UInt8));
        assert_eq!(map.resolve("YEAR"), Ok(CanonicalType::Int16));
        assert_eq!(map.resolve("INT24 UNSIGNED"), Ok(CanonicalType::UInt32));
        assert_eq!(map.resolve("LONGLONG UNSIGNED"), Ok(CanonicalType::UInt64));
        assert_eq!(map.resolve("NEWDECIMAL"), Ok(CanonicalType::Float64));
        assert_eq!(map.resolve("var_string"), Ok(CanonicalType::FixedString(256)));
        assert_eq!(map.resolve("DATETIME"), Ok(CanonicalType::Time64));
        assert_eq!(map.resolve("BIT"), Ok(CanonicalType::Bool));
    }

    #[test]
    fn test_sql_type_names_resolve() {
        let map = TypeMap::mysql(64);

        for sql_type in [
            "TINYINT",
            "SMALLINT UNSIGNED",
            "INT",
            "MEDIUMINT",
            "BIGINT UNSIGNED",
            "FLOAT",
            "DOUBLE",
            "DECIMAL",
            "CHAR",
            "VARCHAR",
            "TINYTEXT",
            "TEXT",
            "MEDIUMTEXT",
            "LONGBLOB",
            "ENUM",
            "SET",
            "JSON",
            "DATE",
            "TIME",
            "DATETIME",
            "TIMESTAMP",
            "YEAR",
            "BIT",
        ] {
            let protocol_type = protocol_type_name(sql_type);
            assert!(
                map.resolve(&protocol_type).is_ok(),
                "{sql_type} ({protocol_type}) has no mapping"
            );
        }

        assert_eq!(
            map.resolve(&protocol_type_name("TEXT")),
            Ok(CanonicalType::FixedString(64))
        );
        assert_eq!(
            map.resolve(&protocol_type_name("DATE")),
            Ok(CanonicalType::Time64)
        );
        assert!(map.resolve(&protocol_type_name("GEOMETRY")).is_err());
    }

    #[test]
    fn test_unknown_type_fails() {
        let map = TypeMap::mysql(256);
        let err = map.resolve("GEOMETRY").unwrap_err();
        assert_eq!(err.native_type, "GEOMETRY");

        let err: EtlError = err.into();
        assert_eq!(err.kind(), ErrorKind::UnknownType);
    }

    #[test]
    fn test_resolve_fields_names_the_field() {
        let map = TypeMap::mysql(16);
        let fields = vec![
            SourceField::new("id", "LONG"),
            SourceField::new("shape", "GEOMETRY"),
        ];

        let err = map.resolve_fields(&fields).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownType);
        assert!(err.detail().unwrap().contains("`shape`"));
    }

    #[test]
    fn test_settings_overrides_and_unknown_fallback() {
        let settings = BuildSettings {
            string_capacity: 32,
            unknown_types_as_string: true,
            type_overrides: BTreeMap::from([
                ("blob".to_string(), "string".to_string()),
                ("DECIMAL".to_string(), "float32".to_string()),
            ]),
            ..BuildSettings::default()
        };

        let map = TypeMap::from_settings(&settings).unwrap();
        assert_eq!(map.resolve("BLOB"), Ok(CanonicalType::FixedString(32)));
        assert_eq!(map.resolve("DECIMAL"), Ok(CanonicalType::Float32));
        assert_eq!(map.resolve("JSON"), Ok(CanonicalType::FixedString(32)));
    }

    #[test]
    fn test_invalid_override_is_a_config_error() {
        let settings = BuildSettings {
            type_overrides: BTreeMap::from([("BLOB".to_string(), "varchar".to_string())]),
            ..BuildSettings::default()
        };

        let err = TypeMap::from_settings(&settings).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
