use std::fmt;

/// Suffix appended to the protocol name of unsigned integer columns.
pub const UNSIGNED_SUFFIX: &str = " UNSIGNED";

/// Translates a sqlx MySQL type name into the wire protocol field type name.
///
/// sqlx reports SQL-level names (`INT`, `VARCHAR`, `TEXT`) while the type table is keyed by the
/// protocol field types (`LONG`, `VAR_STRING`, `BLOB`). Unsigned integers keep an ` UNSIGNED`
/// suffix so they can map to unsigned canonical types. Unrecognized names are returned as-is.
pub fn protocol_type_name(sqlx_type_name: &str) -> String {
    let upper = sqlx_type_name.trim().to_ascii_uppercase();
    let (base, unsigned) = match upper.strip_suffix(UNSIGNED_SUFFIX) {
        Some(base) => (base, true),
        None => (upper.as_str(), false),
    };

    let protocol = match base {
        "TINYINT" | "BOOLEAN" => "TINY",
        "SMALLINT" => "SHORT",
        "INT" | "INTEGER" => "LONG",
        "MEDIUMINT" => "INT24",
        "BIGINT" => "LONGLONG",
        "FLOAT" => "FLOAT",
        "DOUBLE" => "DOUBLE",
        "DECIMAL" => "NEWDECIMAL",
        "TIMESTAMP" => "TIMESTAMP",
        "DATETIME" => "DATETIME",
        "DATE" => "DATE",
        "TIME" => "TIME",
        "YEAR" => "YEAR",
        "BIT" => "BIT",
        "ENUM" => "ENUM",
        "SET" => "SET",
        "JSON" => "JSON",
        "GEOMETRY" => "GEOMETRY",
        "NULL" => "NULL",
        "CHAR" | "BINARY" => "STRING",
        "VARCHAR" | "VARBINARY" => "VAR_STRING",
        "TINYTEXT" | "TINYBLOB" => "TINY_BLOB",
        "TEXT" | "BLOB" => "BLOB",
        "MEDIUMTEXT" | "MEDIUMBLOB" => "MEDIUM_BLOB",
        "LONGTEXT" | "LONGBLOB" => "LONG_BLOB",
        other => return other.to_string(),
    };

    if unsigned && is_integer_protocol_type(protocol) {
        format!("{protocol}{UNSIGNED_SUFFIX}")
    } else {
        protocol.to_string()
    }
}

/// Returns whether the protocol type holds integers.
pub fn is_integer_protocol_type(protocol_type: &str) -> bool {
    matches!(
        protocol_type.strip_suffix(UNSIGNED_SUFFIX).unwrap_or(protocol_type),
        "TINY" | "SHORT" | "LONG" | "INT24" | "LONGLONG" | "YEAR"
    )
}

/// A possibly schema-qualified MySQL table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    /// Parses `table` or `schema.table`.
    pub fn parse(value: &str) -> TableName {
        match value.split_once('.') {
            Some((schema, name)) => TableName {
                schema: Some(schema.to_string()),
                name: name.to_string(),
            },
            None => TableName {
                schema: None,
                name: value.to_string(),
            },
        }
    }

    /// Returns the name quoted with backticks, doubling embedded backticks.
    pub fn as_quoted_identifier(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(&self.name)),
            None => quote_identifier(&self.name),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

fn quote_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_type_names() {
        assert_eq!(protocol_type_name("INT"), "LONG");
        assert_eq!(protocol_type_name("INT UNSIGNED"), "LONG UNSIGNED");
        assert_eq!(protocol_type_name("BIGINT"), "LONGLONG");
        assert_eq!(protocol_type_name("MEDIUMINT UNSIGNED"), "INT24 UNSIGNED");
        assert_eq!(protocol_type_name("VARCHAR"), "VAR_STRING");
        assert_eq!(protocol_type_name("CHAR"), "STRING");
        assert_eq!(protocol_type_name("DECIMAL"), "NEWDECIMAL");
        assert_eq!(protocol_type_name("TEXT"), "BLOB");
        assert_eq!(protocol_type_name("BOOLEAN"), "TINY");
        assert_eq!(protocol_type_name("datetime"), "DATETIME");
        assert_eq!(protocol_type_name("VECTOR"), "VECTOR");
    }

    #[test]
    fn test_unsigned_suffix_only_for_integers() {
        assert_eq!(protocol_type_name("DOUBLE UNSIGNED"), "DOUBLE");
        assert!(is_integer_protocol_type("LONGLONG UNSIGNED"));
        assert!(!is_integer_protocol_type("FLOAT"));
    }

    #[test]
    fn test_table_name_quoting() {
        assert_eq!(TableName::parse("people").as_quoted_identifier(), "`people`");
        assert_eq!(
            TableName::parse("crm.peo`ple").as_quoted_identifier(),
            "`crm`.`peo``ple`"
        );
        assert_eq!(TableName::parse("crm.people").to_string(), "crm.people");
    }
}
