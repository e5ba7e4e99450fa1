use crate::types::{CanonicalSchema, CanonicalType};

/// Returns the DuckDB column type storing a canonical type.
///
/// DuckDB has no half precision type, `float16` columns are stored as `FLOAT`. String capacity
/// is enforced on write, the column itself is an unbounded `VARCHAR`.
pub fn canonical_type_to_duckdb_sql(typ: &CanonicalType) -> &'static str {
    match typ {
        CanonicalType::Int8 => "TINYINT",
        CanonicalType::Int16 => "SMALLINT",
        CanonicalType::Int32 => "INTEGER",
        CanonicalType::Int64 => "BIGINT",
        CanonicalType::UInt8 => "UTINYINT",
        CanonicalType::UInt16 => "USMALLINT",
        CanonicalType::UInt32 => "UINTEGER",
        CanonicalType::UInt64 => "UBIGINT",
        CanonicalType::Float16 | CanonicalType::Float32 => "FLOAT",
        CanonicalType::Float64 => "DOUBLE",
        CanonicalType::FixedString(_) => "VARCHAR",
        CanonicalType::Bool => "BOOLEAN",
        CanonicalType::Time64 => "TIMESTAMP",
    }
}

/// Quotes an identifier, doubling embedded quotes.
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Builds the `CREATE TABLE` statement of a node table.
///
/// Records are always complete, so every column is `NOT NULL`. There is no `IF NOT EXISTS`: a
/// second table with the same name is an error.
pub fn build_create_table_sql(group: &str, name: &str, schema: &CanonicalSchema) -> String {
    let col_defs: Vec<String> = schema
        .fields()
        .iter()
        .map(|field| {
            format!(
                "  {} {} NOT NULL",
                quote_identifier(&field.name),
                canonical_type_to_duckdb_sql(&field.typ)
            )
        })
        .collect();

    format!(
        "CREATE TABLE {}.{} (\n{}\n)",
        quote_identifier(group),
        quote_identifier(name),
        col_defs.join(",\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CanonicalField;

    #[test]
    fn test_type_mapping() {
        assert_eq!(canonical_type_to_duckdb_sql(&CanonicalType::Int8), "TINYINT");
        assert_eq!(canonical_type_to_duckdb_sql(&CanonicalType::UInt64), "UBIGINT");
        assert_eq!(canonical_type_to_duckdb_sql(&CanonicalType::Float16), "FLOAT");
        assert_eq!(canonical_type_to_duckdb_sql(&CanonicalType::Float64), "DOUBLE");
        assert_eq!(
            canonical_type_to_duckdb_sql(&CanonicalType::FixedString(256)),
            "VARCHAR"
        );
        assert_eq!(canonical_type_to_duckdb_sql(&CanonicalType::Time64), "TIMESTAMP");
    }

    #[test]
    fn test_create_table_sql() {
        let schema = CanonicalSchema::new(vec![
            CanonicalField::new("id", CanonicalType::Int32),
            CanonicalField::new("na\"me", CanonicalType::FixedString(16)),
        ]);

        assert_eq!(
            build_create_table_sql("nodes", "Person", &schema),
            "CREATE TABLE \"nodes\".\"Person\" (\n  \"id\" INTEGER NOT NULL,\n  \"na\"\"me\" VARCHAR NOT NULL\n)"
        );
    }
}
