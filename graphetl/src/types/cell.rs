use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};

/// A dynamically typed value read from a source row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Numeric(BigDecimal),
    String(String),
    /// Raw bytes, either binary columns or text the driver could not decode as UTF-8.
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("NULL"),
            Cell::Bool(value) => write!(f, "{value}"),
            Cell::I8(value) => write!(f, "{value}"),
            Cell::I16(value) => write!(f, "{value}"),
            Cell::I32(value) => write!(f, "{value}"),
            Cell::I64(value) => write!(f, "{value}"),
            Cell::U8(value) => write!(f, "{value}"),
            Cell::U16(value) => write!(f, "{value}"),
            Cell::U32(value) => write!(f, "{value}"),
            Cell::U64(value) => write!(f, "{value}"),
            Cell::F32(value) => write!(f, "{value}"),
            Cell::F64(value) => write!(f, "{value}"),
            Cell::Numeric(value) => write!(f, "{value}"),
            Cell::String(value) => write!(f, "{value:?}"),
            Cell::Bytes(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Cell::Date(value) => write!(f, "{value}"),
            Cell::Timestamp(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::I32(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::F64(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}
