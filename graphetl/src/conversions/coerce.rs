use thiserror::Error;

use crate::conversions::{AssignError, assign, transliterate_to_ascii};
use crate::error::{ErrorKind, EtlError};
use crate::etl_error;
use crate::types::{CanonicalField, CanonicalType, Cell, FieldValue};

/// Longest rendering of an offending value kept in a [`RowCoercionError`].
const MAX_REPORTED_VALUE_CHARS: usize = 64;

/// Error returned when a source value cannot be stored in its column, discarding the row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot store {value} in field `{field}` of type {destination_type}: {reason}")]
pub struct RowCoercionError {
    pub field: String,
    pub value: String,
    pub destination_type: CanonicalType,
    pub reason: AssignError,
}

impl From<RowCoercionError> for EtlError {
    #[track_caller]
    fn from(err: RowCoercionError) -> EtlError {
        etl_error!(
            ErrorKind::RowCoercionFailed,
            "Row discarded, a value could not be coerced",
            err.to_string(),
            source: err
        )
    }
}

/// Outcome of coercing one source value.
#[derive(Debug, Clone, PartialEq)]
pub enum Coercion {
    /// The value was null, the column keeps its default.
    Default,
    /// The value was stored as-is.
    Direct(FieldValue),
    /// The value was stored after transliteration to ASCII.
    Transliterated(FieldValue),
}

/// Coerces `value` into `field`.
///
/// Direct assignment is tried first. A type or encoding mismatch on a non-null value is retried
/// once with the value's text normalized, stripped of combining marks and non-ASCII characters,
/// and offered as a byte string. Range errors and failed retries are reported.
pub fn coerce_value(field: &CanonicalField, value: &Cell) -> Result<Coercion, RowCoercionError> {
    if value.is_null() {
        return Ok(Coercion::Default);
    }

    match assign(value, &field.typ) {
        Ok(stored) => Ok(Coercion::Direct(stored)),
        Err(AssignError::Mismatch) => {
            let fallback = Cell::Bytes(transliterate_to_ascii(&cell_text(value)).into_bytes());
            assign(&fallback, &field.typ)
                .map(Coercion::Transliterated)
                .map_err(|reason| coercion_error(field, value, reason))
        }
        Err(reason) => Err(coercion_error(field, value, reason)),
    }
}

fn cell_text(value: &Cell) -> String {
    match value {
        Cell::String(text) => text.clone(),
        Cell::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        other => other.to_string(),
    }
}

fn coercion_error(field: &CanonicalField, value: &Cell, reason: AssignError) -> RowCoercionError {
    let mut rendered = value.to_string();
    if rendered.chars().count() > MAX_REPORTED_VALUE_CHARS {
        rendered = rendered.chars().take(MAX_REPORTED_VALUE_CHARS).collect();
        rendered.push_str("...");
    }

    RowCoercionError {
        field: field.name.clone(),
        value: rendered,
        destination_type: field.typ,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_keeps_default() {
        let field = CanonicalField::new("age", CanonicalType::Int32);
        assert_eq!(coerce_value(&field, &Cell::Null), Ok(Coercion::Default));
    }

    #[test]
    fn test_non_ascii_text_is_transliterated() {
        let field = CanonicalField::new("name", CanonicalType::FixedString(16));
        assert_eq!(
            coerce_value(&field, &Cell::from("Zoë Ångström")),
            Ok(Coercion::Transliterated(FieldValue::String(
                "Zoe Angstrom".to_string()
            )))
        );
        assert_eq!(
            coerce_value(&field, &Cell::from("Ana")),
            Ok(Coercion::Direct(FieldValue::String("Ana".to_string())))
        );
    }

    #[test]
    fn test_fallback_parses_transliterated_digits() {
        let field = CanonicalField::new("n", CanonicalType::Int32);
        assert_eq!(
            coerce_value(&field, &Cell::from("①2")),
            Ok(Coercion::Transliterated(FieldValue::I32(12)))
        );
    }

    #[test]
    fn test_unconvertible_value_is_reported() {
        let field = CanonicalField::new("age", CanonicalType::Int32);
        let err = coerce_value(&field, &Cell::from("unknown")).unwrap_err();

        assert_eq!(err.field, "age");
        assert_eq!(err.value, "\"unknown\"");
        assert_eq!(err.destination_type, CanonicalType::Int32);
        assert_eq!(err.reason, AssignError::Mismatch);
        assert_eq!(EtlError::from(err).kind(), ErrorKind::RowCoercionFailed);
    }

    #[test]
    fn test_out_of_range_is_not_retried() {
        let field = CanonicalField::new("small", CanonicalType::Int8);
        let err = coerce_value(&field, &Cell::I64(1_000)).unwrap_err();
        assert_eq!(err.reason, AssignError::OutOfRange);
    }

    #[test]
    fn test_non_boolean_text_is_not_a_bool() {
        let field = CanonicalField::new("active", CanonicalType::Bool);

        for text in ["maybe", "N/A", "été"] {
            let err = coerce_value(&field, &Cell::from(text)).unwrap_err();
            assert_eq!(err.destination_type, CanonicalType::Bool);
            assert_eq!(err.reason, AssignError::Mismatch);
        }
        assert_eq!(
            coerce_value(&field, &Cell::from("Yes")),
            Ok(Coercion::Direct(FieldValue::Bool(true)))
        );
    }

    #[test]
    fn test_invalid_utf8_bytes_fall_back_to_ascii() {
        let field = CanonicalField::new("name", CanonicalType::FixedString(8));
        let bytes = Cell::Bytes(vec![b'J', 0xff, b'o']);

        assert_eq!(
            coerce_value(&field, &bytes),
            Ok(Coercion::Transliterated(FieldValue::String("Jo".to_string())))
        );

        let field = CanonicalField::new("n", CanonicalType::Int32);
        let err = coerce_value(&field, &bytes).unwrap_err();
        assert_eq!(err.reason, AssignError::Mismatch);
    }
}
