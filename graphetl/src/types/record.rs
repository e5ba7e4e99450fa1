use crate::types::{CanonicalSchema, CanonicalType};

/// A value stored in a node table column, always of the column's canonical type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    /// Rounded to half precision, carried as `f32` and stored in a `FLOAT` column.
    F16(f32),
    F32(f32),
    F64(f64),
    /// ASCII text no longer than the column capacity.
    String(String),
    Bool(bool),
    /// Microseconds since the Unix epoch.
    Time64(i64),
}

impl FieldValue {
    /// Returns the value a column holds when no source supplied one.
    ///
    /// Zero for numbers, the empty string, `false` and the Unix epoch.
    pub fn default_for(typ: &CanonicalType) -> FieldValue {
        match typ {
            CanonicalType::Int8 => FieldValue::I8(0),
            CanonicalType::Int16 => FieldValue::I16(0),
            CanonicalType::Int32 => FieldValue::I32(0),
            CanonicalType::Int64 => FieldValue::I64(0),
            CanonicalType::UInt8 => FieldValue::U8(0),
            CanonicalType::UInt16 => FieldValue::U16(0),
            CanonicalType::UInt32 => FieldValue::U32(0),
            CanonicalType::UInt64 => FieldValue::U64(0),
            CanonicalType::Float16 => FieldValue::F16(0.0),
            CanonicalType::Float32 => FieldValue::F32(0.0),
            CanonicalType::Float64 => FieldValue::F64(0.0),
            CanonicalType::FixedString(_) => FieldValue::String(String::new()),
            CanonicalType::Bool => FieldValue::Bool(false),
            CanonicalType::Time64 => FieldValue::Time64(0),
        }
    }
}

/// A complete destination row, one value per canonical field in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRecord {
    values: Vec<FieldValue>,
}

impl TableRecord {
    /// Creates a record holding the default value of every field.
    pub fn with_defaults(schema: &CanonicalSchema) -> Self {
        let values = schema
            .fields()
            .iter()
            .map(|field| FieldValue::default_for(&field.typ))
            .collect();

        Self { values }
    }

    pub fn new(values: Vec<FieldValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// Replaces the value at `index`. Out of range indexes are ignored.
    pub fn set(&mut self, index: usize, value: FieldValue) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    pub fn into_values(self) -> Vec<FieldValue> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CanonicalField;

    #[test]
    fn test_defaults_follow_schema_order() {
        let schema = CanonicalSchema::new(vec![
            CanonicalField::new("id", CanonicalType::UInt32),
            CanonicalField::new("name", CanonicalType::FixedString(4)),
            CanonicalField::new("active", CanonicalType::Bool),
            CanonicalField::new("seen", CanonicalType::Time64),
        ]);

        let mut record = TableRecord::with_defaults(&schema);
        assert_eq!(
            record.values(),
            &[
                FieldValue::U32(0),
                FieldValue::String(String::new()),
                FieldValue::Bool(false),
                FieldValue::Time64(0),
            ]
        );

        record.set(0, FieldValue::U32(9));
        record.set(10, FieldValue::U32(1));
        assert_eq!(record.values()[0], FieldValue::U32(9));
        assert_eq!(record.into_values().len(), 4);
    }
}
