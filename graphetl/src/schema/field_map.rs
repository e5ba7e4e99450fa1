use std::collections::HashMap;

use crate::types::CanonicalSchema;

/// For every canonical field, its position among a source's fields, if the source has it.
pub type FieldIndexMap = Vec<Option<usize>>;

/// Computes the [`FieldIndexMap`] of a source against a canonical schema.
///
/// The result has one entry per canonical field. When a source lists a name twice the first
/// occurrence wins.
pub fn field_index_map<S: AsRef<str>>(
    schema: &CanonicalSchema,
    source_field_names: &[S],
) -> FieldIndexMap {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(source_field_names.len());
    for (position, name) in source_field_names.iter().enumerate() {
        positions.entry(name.as_ref()).or_insert(position);
    }

    schema
        .fields()
        .iter()
        .map(|field| positions.get(field.name.as_str()).copied())
        .collect()
}

/// Inverts a [`FieldIndexMap`]: for every source position, the canonical field it feeds.
///
/// Source fields outside the canonical schema map to `None`.
pub fn source_to_canonical(index_map: &[Option<usize>], source_len: usize) -> Vec<Option<usize>> {
    let mut inverse = vec![None; source_len];
    for (canonical, source_position) in index_map.iter().enumerate() {
        if let Some(position) = source_position {
            if let Some(slot) = inverse.get_mut(*position) {
                *slot = Some(canonical);
            }
        }
    }

    inverse
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CanonicalField, CanonicalType};

    fn person_schema() -> CanonicalSchema {
        CanonicalSchema::new(vec![
            CanonicalField::new("id", CanonicalType::Int32),
            CanonicalField::new("name", CanonicalType::FixedString(256)),
            CanonicalField::new("age", CanonicalType::Int32),
        ])
    }

    #[test]
    fn test_index_map_marks_absent_fields() {
        let schema = person_schema();

        assert_eq!(
            field_index_map(&schema, &["id", "name"]),
            vec![Some(0), Some(1), None]
        );
        assert_eq!(
            field_index_map(&schema, &["id", "name", "age"]),
            vec![Some(0), Some(1), Some(2)]
        );
        assert_eq!(
            field_index_map(&schema, &["age", "extra", "id"]),
            vec![Some(2), None, Some(0)]
        );
    }

    #[test]
    fn test_index_map_length_matches_schema() {
        let schema = person_schema();
        let empty: [&str; 0] = [];
        assert_eq!(field_index_map(&schema, &empty).len(), schema.len());
    }

    #[test]
    fn test_inverse_ignores_extra_source_fields() {
        let index_map = vec![Some(2), None, Some(0)];
        assert_eq!(
            source_to_canonical(&index_map, 3),
            vec![Some(2), None, Some(0)]
        );
    }
}
