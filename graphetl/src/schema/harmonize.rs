use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use crate::error::{ErrorKind, EtlError};
use crate::etl_error;
use crate::types::{CanonicalField, CanonicalSchema, CanonicalType};

/// Error returned when sources disagree on the type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field `{field}` has conflicting types {}", format_types(.types))]
pub struct SchemaConflictError {
    pub field: String,
    pub types: BTreeSet<CanonicalType>,
}

fn format_types(types: &BTreeSet<CanonicalType>) -> String {
    let names: Vec<String> = types.iter().map(ToString::to_string).collect();
    format!("{{{}}}", names.join(", "))
}

impl From<SchemaConflictError> for EtlError {
    #[track_caller]
    fn from(err: SchemaConflictError) -> EtlError {
        etl_error!(
            ErrorKind::SchemaConflict,
            "Sources disagree on a field type",
            err.to_string(),
            source: err
        )
    }
}

/// Merges the resolved layouts of every source of one node type into a canonical schema.
///
/// Fields are ordered by first appearance, scanning sources in order and each source's fields in
/// order. A field absent from some sources is kept. When a field name carries more than one type
/// the first such field (in that same order) is reported and no schema is returned.
pub fn merge_fields<I, F>(per_source_fields: I) -> Result<CanonicalSchema, SchemaConflictError>
where
    I: IntoIterator<Item = F>,
    F: AsRef<[CanonicalField]>,
{
    let mut merged: Vec<(String, BTreeSet<CanonicalType>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for fields in per_source_fields {
        for field in fields.as_ref() {
            match positions.get(&field.name) {
                Some(&position) => {
                    merged[position].1.insert(field.typ);
                }
                None => {
                    positions.insert(field.name.clone(), merged.len());
                    merged.push((field.name.clone(), BTreeSet::from([field.typ])));
                }
            }
        }
    }

    let mut fields = Vec::with_capacity(merged.len());
    for (name, types) in merged {
        let mut iter = types.iter();
        match (iter.next(), iter.next()) {
            (Some(typ), None) => fields.push(CanonicalField::new(name, *typ)),
            _ => return Err(SchemaConflictError { field: name, types }),
        }
    }

    Ok(CanonicalSchema::new(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, typ: CanonicalType) -> CanonicalField {
        CanonicalField::new(name, typ)
    }

    #[test]
    fn test_merge_keeps_first_appearance_order() {
        let a = vec![
            field("id", CanonicalType::Int32),
            field("name", CanonicalType::FixedString(256)),
        ];
        let b = vec![
            field("age", CanonicalType::Int32),
            field("id", CanonicalType::Int32),
            field("name", CanonicalType::FixedString(256)),
        ];

        let schema = merge_fields([a, b]).unwrap();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "age"]);
        assert_eq!(schema.field("age").unwrap().typ, CanonicalType::Int32);
    }

    #[test]
    fn test_merge_is_complete_without_overlap() {
        let schema = merge_fields([
            vec![field("a", CanonicalType::Bool)],
            vec![field("b", CanonicalType::Time64)],
            vec![],
        ])
        .unwrap();
        assert_eq!(schema.len(), 2);
    }

    #[test]
    fn test_conflict_reports_field_and_types() {
        let err = merge_fields([
            vec![field("f", CanonicalType::Int32)],
            vec![field("f", CanonicalType::FixedString(256))],
        ])
        .unwrap_err();

        assert_eq!(err.field, "f");
        assert_eq!(
            err.types,
            BTreeSet::from([CanonicalType::Int32, CanonicalType::FixedString(256)])
        );
        assert_eq!(
            err.to_string(),
            "field `f` has conflicting types {int32, string(256)}"
        );
    }

    #[test]
    fn test_first_conflicting_field_is_reported() {
        let err = merge_fields([
            vec![field("x", CanonicalType::Int8), field("y", CanonicalType::Int8)],
            vec![field("y", CanonicalType::Int16), field("x", CanonicalType::Int16)],
        ])
        .unwrap_err();
        assert_eq!(err.field, "x");
    }

    #[test]
    fn test_no_sources_yields_empty_schema() {
        let schema = merge_fields(Vec::<Vec<CanonicalField>>::new()).unwrap();
        assert!(schema.is_empty());
    }
}
