use std::fmt;

use bigdecimal::ToPrimitive;
use chrono::{NaiveDate, NaiveDateTime};
use half::f16;

use crate::types::{CanonicalType, Cell, FieldValue};

/// Largest finite half precision value.
const F16_MAX: f64 = 65504.0;

/// Text formats accepted for `time64` columns.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Why a value could not be stored in a column as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    /// The value's type or encoding does not fit the column.
    Mismatch,
    /// The value fits the column's kind but not its range.
    OutOfRange,
}

impl fmt::Display for AssignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignError::Mismatch => f.write_str("type mismatch"),
            AssignError::OutOfRange => f.write_str("value out of range"),
        }
    }
}

impl std::error::Error for AssignError {}

/// Stores a non-null value into a column of type `typ` without any transliteration.
pub fn assign(value: &Cell, typ: &CanonicalType) -> Result<FieldValue, AssignError> {
    match typ {
        CanonicalType::Int8 => Ok(FieldValue::I8(narrow(to_integer(value)?)?)),
        CanonicalType::Int16 => Ok(FieldValue::I16(narrow(to_integer(value)?)?)),
        CanonicalType::Int32 => Ok(FieldValue::I32(narrow(to_integer(value)?)?)),
        CanonicalType::Int64 => Ok(FieldValue::I64(narrow(to_integer(value)?)?)),
        CanonicalType::UInt8 => Ok(FieldValue::U8(narrow(to_integer(value)?)?)),
        CanonicalType::UInt16 => Ok(FieldValue::U16(narrow(to_integer(value)?)?)),
        CanonicalType::UInt32 => Ok(FieldValue::U32(narrow(to_integer(value)?)?)),
        CanonicalType::UInt64 => Ok(FieldValue::U64(narrow(to_integer(value)?)?)),
        CanonicalType::Float16 => {
            let float = to_float(value)?;
            if float.is_finite() && float.abs() > F16_MAX {
                return Err(AssignError::OutOfRange);
            }
            Ok(FieldValue::F16(f16::from_f64(float).to_f32()))
        }
        CanonicalType::Float32 => {
            let float = to_float(value)?;
            if float.is_finite() && float.abs() > f64::from(f32::MAX) {
                return Err(AssignError::OutOfRange);
            }
            Ok(FieldValue::F32(float as f32))
        }
        CanonicalType::Float64 => Ok(FieldValue::F64(to_float(value)?)),
        CanonicalType::FixedString(capacity) => {
            let mut text = to_ascii_text(value)?;
            text.truncate(*capacity);
            Ok(FieldValue::String(text))
        }
        CanonicalType::Bool => Ok(FieldValue::Bool(to_bool(value)?)),
        CanonicalType::Time64 => Ok(FieldValue::Time64(to_micros(value)?)),
    }
}

fn narrow<T: TryFrom<i128>>(value: i128) -> Result<T, AssignError> {
    T::try_from(value).map_err(|_| AssignError::OutOfRange)
}

fn to_integer(value: &Cell) -> Result<i128, AssignError> {
    match value {
        Cell::Bool(value) => Ok(i128::from(*value)),
        Cell::I8(value) => Ok(i128::from(*value)),
        Cell::I16(value) => Ok(i128::from(*value)),
        Cell::I32(value) => Ok(i128::from(*value)),
        Cell::I64(value) => Ok(i128::from(*value)),
        Cell::U8(value) => Ok(i128::from(*value)),
        Cell::U16(value) => Ok(i128::from(*value)),
        Cell::U32(value) => Ok(i128::from(*value)),
        Cell::U64(value) => Ok(i128::from(*value)),
        Cell::F32(value) => integral_float(f64::from(*value)),
        Cell::F64(value) => integral_float(*value),
        Cell::Numeric(value) => {
            if !value.is_integer() {
                return Err(AssignError::Mismatch);
            }
            value.to_i128().ok_or(AssignError::OutOfRange)
        }
        Cell::String(text) => text.trim().parse().map_err(|_| AssignError::Mismatch),
        Cell::Bytes(bytes) => std::str::from_utf8(bytes)
            .map_err(|_| AssignError::Mismatch)?
            .trim()
            .parse()
            .map_err(|_| AssignError::Mismatch),
        Cell::Null | Cell::Date(_) | Cell::Timestamp(_) => Err(AssignError::Mismatch),
    }
}

fn integral_float(value: f64) -> Result<i128, AssignError> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(AssignError::Mismatch);
    }
    if value.abs() >= 2f64.powi(127) {
        return Err(AssignError::OutOfRange);
    }

    Ok(value as i128)
}

fn to_float(value: &Cell) -> Result<f64, AssignError> {
    match value {
        Cell::Bool(value) => Ok(if *value { 1.0 } else { 0.0 }),
        Cell::I8(value) => Ok(f64::from(*value)),
        Cell::I16(value) => Ok(f64::from(*value)),
        Cell::I32(value) => Ok(f64::from(*value)),
        Cell::I64(value) => Ok(*value as f64),
        Cell::U8(value) => Ok(f64::from(*value)),
        Cell::U16(value) => Ok(f64::from(*value)),
        Cell::U32(value) => Ok(f64::from(*value)),
        Cell::U64(value) => Ok(*value as f64),
        Cell::F32(value) => Ok(f64::from(*value)),
        Cell::F64(value) => Ok(*value),
        Cell::Numeric(value) => value.to_f64().ok_or(AssignError::OutOfRange),
        Cell::String(text) => text.trim().parse().map_err(|_| AssignError::Mismatch),
        Cell::Bytes(bytes) => std::str::from_utf8(bytes)
            .map_err(|_| AssignError::Mismatch)?
            .trim()
            .parse()
            .map_err(|_| AssignError::Mismatch),
        Cell::Null | Cell::Date(_) | Cell::Timestamp(_) => Err(AssignError::Mismatch),
    }
}

fn to_ascii_text(value: &Cell) -> Result<String, AssignError> {
    match value {
        Cell::String(text) if text.is_ascii() => Ok(text.clone()),
        Cell::Bytes(bytes) if bytes.is_ascii() => {
            String::from_utf8(bytes.clone()).map_err(|_| AssignError::Mismatch)
        }
        Cell::String(_) | Cell::Bytes(_) | Cell::Null => Err(AssignError::Mismatch),
        Cell::Timestamp(value) => Ok(value.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        other => Ok(other.to_string()),
    }
}

fn to_bool(value: &Cell) -> Result<bool, AssignError> {
    match value {
        Cell::Bool(value) => Ok(*value),
        Cell::F32(value) => Ok(*value != 0.0),
        Cell::F64(value) => Ok(*value != 0.0),
        Cell::String(text) => parse_bool_text(text).ok_or(AssignError::Mismatch),
        Cell::Bytes(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(parse_bool_text)
            .ok_or(AssignError::Mismatch),
        Cell::Numeric(value) => Ok(value.to_f64().is_some_and(|value| value != 0.0)),
        Cell::Null | Cell::Date(_) | Cell::Timestamp(_) => Err(AssignError::Mismatch),
        integer => Ok(to_integer(integer)? != 0),
    }
}

fn parse_bool_text(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => Some(true),
        "0" | "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn to_micros(value: &Cell) -> Result<i64, AssignError> {
    match value {
        Cell::Timestamp(value) => Ok(value.and_utc().timestamp_micros()),
        Cell::Date(value) => value
            .and_hms_opt(0, 0, 0)
            .map(|value| value.and_utc().timestamp_micros())
            .ok_or(AssignError::OutOfRange),
        Cell::String(text) => parse_timestamp_text(text),
        Cell::Bytes(bytes) => {
            parse_timestamp_text(std::str::from_utf8(bytes).map_err(|_| AssignError::Mismatch)?)
        }
        _ => Err(AssignError::Mismatch),
    }
}

fn parse_timestamp_text(text: &str) -> Result<i64, AssignError> {
    let text = text.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(value) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(value.and_utc().timestamp_micros());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|_| AssignError::Mismatch)
        .and_then(|date| to_micros(&Cell::Date(date)))
}
