use thiserror::Error;

use crate::conversions::{Coercion, RowCoercionError, coerce_value};
use crate::registry::SourceBinding;
use crate::schema::source_to_canonical;
use crate::types::{CanonicalSchema, SourceRow, TableRecord};

/// Why a source row produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// A value could not be coerced, the row is discarded.
    #[error(transparent)]
    Coercion(#[from] RowCoercionError),

    /// The row does not match the described layout, the source no longer matches discovery.
    #[error("row has {actual} values but the source described {expected} fields")]
    Layout { expected: usize, actual: usize },
}

/// A record built from one row, with the number of values stored through transliteration.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltRecord {
    pub record: TableRecord,
    pub coerced: u64,
}

/// Builds destination records from the rows of one bound source.
///
/// Row values are matched to canonical fields by name through the binding's field index map.
/// Source fields outside the canonical schema are ignored, canonical fields missing from the
/// source keep their defaults. When a source repeats a column name, the first column with that
/// name fills the field and the later ones are ignored.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    schema: CanonicalSchema,
    targets: Vec<Option<usize>>,
}

impl RecordBuilder {
    pub fn new(schema: &CanonicalSchema, binding: &SourceBinding) -> Self {
        Self::from_index_map(schema, &binding.field_index_map, binding.field_names.len())
    }

    pub fn from_index_map(
        schema: &CanonicalSchema,
        field_index_map: &[Option<usize>],
        source_len: usize,
    ) -> Self {
        Self {
            schema: schema.clone(),
            targets: source_to_canonical(field_index_map, source_len),
        }
    }

    pub fn build(&self, row: &SourceRow) -> Result<BuiltRecord, RecordError> {
        if row.len() != self.targets.len() {
            return Err(RecordError::Layout {
                expected: self.targets.len(),
                actual: row.len(),
            });
        }

        let mut record = TableRecord::with_defaults(&self.schema);
        let mut coerced = 0;

        for (value, target) in row.values().iter().zip(&self.targets) {
            let Some(index) = *target else {
                continue;
            };
            let field = &self.schema.fields()[index];

            match coerce_value(field, value)? {
                Coercion::Default => {}
                Coercion::Direct(stored) => record.set(index, stored),
                Coercion::Transliterated(stored) => {
                    coerced += 1;
                    record.set(index, stored);
                }
            }
        }

        Ok(BuiltRecord { record, coerced })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversions::AssignError;
    use crate::schema::field_index_map;
    use crate::types::{CanonicalField, CanonicalType, Cell, FieldValue};

    fn person_schema() -> CanonicalSchema {
        CanonicalSchema::new(vec![
            CanonicalField::new("id", CanonicalType::Int32),
            CanonicalField::new("name", CanonicalType::FixedString(256)),
            CanonicalField::new("age", CanonicalType::Int32),
        ])
    }

    #[test]
    fn test_missing_fields_keep_defaults() {
        let builder = RecordBuilder::from_index_map(&person_schema(), &[Some(0), Some(1), None], 2);

        let built = builder
            .build(&SourceRow::new(vec![Cell::I32(7), Cell::from("Ana")]))
            .unwrap();
        assert_eq!(
            built.record.values(),
            &[
                FieldValue::I32(7),
                FieldValue::String("Ana".to_string()),
                FieldValue::I32(0),
            ]
        );
        assert_eq!(built.coerced, 0);
    }

    #[test]
    fn test_repeated_column_name_uses_the_first() {
        let schema = person_schema();
        let index_map = field_index_map(&schema, &["id", "name", "id"]);
        let builder = RecordBuilder::from_index_map(&schema, &index_map, 3);

        let built = builder
            .build(&SourceRow::new(vec![
                Cell::I32(5),
                Cell::from("Eve"),
                Cell::I32(9),
            ]))
            .unwrap();
        assert_eq!(built.record.values()[0], FieldValue::I32(5));
    }

    #[test]
    fn test_values_follow_names_not_positions() {
        // Source order: age, extra, id.
        let builder =
            RecordBuilder::from_index_map(&person_schema(), &[Some(2), None, Some(0)], 3);

        let built = builder
            .build(&SourceRow::new(vec![
                Cell::I32(1),
                Cell::from("ignored"),
                Cell::I32(40),
            ]))
            .unwrap();
        assert_eq!(
            built.record.values(),
            &[
                FieldValue::I32(40),
                FieldValue::String(String::new()),
                FieldValue::I32(1),
            ]
        );
    }

    #[test]
    fn test_counts_transliterated_values_and_keeps_nulls() {
        let builder =
            RecordBuilder::from_index_map(&person_schema(), &[Some(0), Some(1), Some(2)], 3);

        let built = builder
            .build(&SourceRow::new(vec![Cell::I32(1), Cell::from("Zoë"), Cell::Null]))
            .unwrap();
        assert_eq!(built.coerced, 1);
        assert_eq!(built.record.values()[1], FieldValue::String("Zoe".to_string()));
        assert_eq!(built.record.values()[2], FieldValue::I32(0));
    }

    #[test]
    fn test_coercion_failure_discards_row() {
        let builder =
            RecordBuilder::from_index_map(&person_schema(), &[Some(0), Some(1), Some(2)], 3);

        let err = builder
            .build(&SourceRow::new(vec![
                Cell::I32(1),
                Cell::from("Ana"),
                Cell::from("n/a"),
            ]))
            .unwrap_err();
        match err {
            RecordError::Coercion(err) => {
                assert_eq!(err.field, "age");
                assert_eq!(err.reason, AssignError::Mismatch);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_layout_mismatch() {
        let builder = RecordBuilder::from_index_map(&person_schema(), &[Some(0), None, None], 1);

        assert_eq!(
            builder.build(&SourceRow::new(vec![Cell::I32(1), Cell::I32(2)])),
            Err(RecordError::Layout {
                expected: 1,
                actual: 2
            })
        );
    }
}
