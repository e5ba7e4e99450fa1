use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures::StreamExt;
use graphetl_config::shared::SourceConfig;
use graphetl_mysql::connection::{MySqlConnectionConfig, connect_to_source_database};
use graphetl_mysql::option_file::ClientOptions;
use graphetl_mysql::types::{TableName, UNSIGNED_SUFFIX, protocol_type_name};
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::{Column, Executor, Row, Statement, TypeInfo};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::source::{RowStream, SourceAdapter, SourceConnector};
use crate::types::{Cell, SourceField, SourceRow};

/// Rows buffered between the reading task and the consumer.
const ROW_CHANNEL_CAPACITY: usize = 256;

/// Connector of the `mysql` source type.
#[derive(Debug, Clone)]
pub struct MySqlSourceConnector {
    defaults: Option<ClientOptions>,
    connect_timeout: Duration,
}

impl MySqlSourceConnector {
    pub const KIND: &'static str = "mysql";

    /// Creates a connector. `defaults` come from a MySQL option file and fill in whatever a
    /// source entry leaves unset.
    pub fn new(defaults: Option<ClientOptions>, connect_timeout: Duration) -> Self {
        Self {
            defaults,
            connect_timeout,
        }
    }
}

#[async_trait]
impl SourceConnector for MySqlSourceConnector {
    fn kind(&self) -> &str {
        Self::KIND
    }

    async fn connect(
        &self,
        source_name: &str,
        config: &SourceConfig,
    ) -> EtlResult<Arc<dyn SourceAdapter>> {
        let connection = MySqlConnectionConfig::resolve(config, self.defaults.as_ref());
        let target = connection.display_target();

        // One connection per adapter, a stream must finish before the next query.
        let pool = connect_to_source_database(&connection, 1, self.connect_timeout)
            .await
            .map_err(|err| {
                etl_error!(
                    ErrorKind::SourceUnavailable,
                    "Failed to connect to MySQL source",
                    format!("source `{source_name}` at {target}: {err}"),
                    source: err
                )
            })?;

        info!(source = source_name, target = %target, "connected to mysql source");

        Ok(Arc::new(MySqlSourceAdapter {
            source_name: source_name.to_string(),
            pool,
        }))
    }
}

/// Adapter reading one MySQL database over a single-connection pool.
#[derive(Debug, Clone)]
pub struct MySqlSourceAdapter {
    source_name: String,
    pool: MySqlPool,
}

impl MySqlSourceAdapter {
    fn unavailable(&self, table: &TableName, err: sqlx::Error) -> EtlError {
        etl_error!(
            ErrorKind::SourceUnavailable,
            "Source table is not readable",
            format!("table `{table}` of source `{}`: {err}", self.source_name),
            source: err
        )
    }
}

#[async_trait]
impl SourceAdapter for MySqlSourceAdapter {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    async fn describe_schema(&self, table: &str) -> EtlResult<Vec<SourceField>> {
        let table = TableName::parse(table);
        let query = format!("SELECT * FROM {} LIMIT 1", table.as_quoted_identifier());

        let statement = (&self.pool)
            .prepare(&query)
            .await
            .map_err(|err| self.unavailable(&table, err))?;

        let fields: Vec<SourceField> = statement
            .columns()
            .iter()
            .map(|column| {
                SourceField::new(column.name(), protocol_type_name(column.type_info().name()))
            })
            .collect();

        debug!(
            source = %self.source_name,
            table = %table,
            columns = fields.len(),
            "described mysql table"
        );

        Ok(fields)
    }

    async fn stream_rows(&self, table: &str) -> EtlResult<RowStream> {
        let table = TableName::parse(table);
        let query = format!("SELECT * FROM {}", table.as_quoted_identifier());
        let pool = self.pool.clone();
        let source_name = self.source_name.clone();

        let (tx, rx) = mpsc::channel::<EtlResult<SourceRow>>(ROW_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut rows = sqlx::query(&query).fetch(&pool);

            while let Some(row) = rows.next().await {
                let item = match row {
                    Ok(row) => decode_row(&row),
                    Err(err) => Err(etl_error!(
                        ErrorKind::SourceStreamFailed,
                        "Failed to read the next source row",
                        format!("table `{table}` of source `{source_name}`: {err}"),
                        source: err
                    )),
                };

                let stop = item
                    .as_ref()
                    .is_err_and(|err| err.kind() == ErrorKind::SourceStreamFailed);

                // The consumer dropped the stream.
                if tx.send(item).await.is_err() {
                    debug!(source = %source_name, table = %table, "mysql row stream dropped");
                    return;
                }
                if stop {
                    return;
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        Ok(stream.boxed())
    }
}

/// Decodes every column of a row into a [`Cell`], by its protocol type.
///
/// A value the typed decoder rejects is read again as raw bytes. A value that cannot be read at
/// all yields a conversion error, which discards the row.
fn decode_row(row: &MySqlRow) -> EtlResult<SourceRow> {
    let mut values = Vec::with_capacity(row.columns().len());

    for (index, column) in row.columns().iter().enumerate() {
        let protocol_type = protocol_type_name(column.type_info().name());
        let cell = match decode_typed(row, index, &protocol_type) {
            Ok(cell) => cell,
            Err(err) => {
                warn!(
                    column = column.name(),
                    protocol_type = %protocol_type,
                    error = %err,
                    "typed decode failed, reading raw bytes"
                );
                row.try_get_unchecked::<Option<Vec<u8>>, _>(index)?
                    .map(Cell::Bytes)
                    .unwrap_or(Cell::Null)
            }
        };
        values.push(cell);
    }

    Ok(SourceRow::new(values))
}

fn decode_typed(row: &MySqlRow, index: usize, protocol_type: &str) -> Result<Cell, sqlx::Error> {
    let unsigned = protocol_type.ends_with(UNSIGNED_SUFFIX);
    let base = protocol_type
        .strip_suffix(UNSIGNED_SUFFIX)
        .unwrap_or(protocol_type);

    let cell = match (base, unsigned) {
        ("TINY", false) => get::<i8>(row, index)?.map(Cell::I8),
        ("TINY", true) => get::<u8>(row, index)?.map(Cell::U8),
        ("SHORT", false) => get::<i16>(row, index)?.map(Cell::I16),
        ("SHORT", true) | ("YEAR", _) => get::<u16>(row, index)?.map(Cell::U16),
        ("LONG" | "INT24", false) => get::<i32>(row, index)?.map(Cell::I32),
        ("LONG" | "INT24", true) => get::<u32>(row, index)?.map(Cell::U32),
        ("LONGLONG", false) => get::<i64>(row, index)?.map(Cell::I64),
        ("LONGLONG", true) => get::<u64>(row, index)?.map(Cell::U64),
        ("FLOAT", _) => get::<f32>(row, index)?.map(Cell::F32),
        ("DOUBLE", _) => get::<f64>(row, index)?.map(Cell::F64),
        ("NEWDECIMAL" | "DECIMAL", _) => get::<BigDecimal>(row, index)?.map(Cell::Numeric),
        ("DATETIME" | "TIMESTAMP", _) => get::<NaiveDateTime>(row, index)?.map(Cell::Timestamp),
        ("DATE", _) => get::<NaiveDate>(row, index)?.map(Cell::Date),
        ("BIT", _) => get::<Vec<u8>>(row, index)?.map(|bits| Cell::U64(bit_value(&bits))),
        ("TIME", _) => get::<NaiveTime>(row, index)?.map(|time| Cell::String(time.to_string())),
        ("VAR_STRING" | "STRING" | "ENUM" | "SET" | "JSON", _)
        | ("BLOB" | "TINY_BLOB" | "MEDIUM_BLOB" | "LONG_BLOB", _) => {
            get::<String>(row, index)?.map(Cell::String)
        }
        _ => get::<Vec<u8>>(row, index)?.map(Cell::Bytes),
    };

    Ok(cell.unwrap_or(Cell::Null))
}

/// Reads a `BIT(n)` payload, sent as big-endian bytes.
fn bit_value(bits: &[u8]) -> u64 {
    bits.iter().fold(0, |value, byte| (value << 8) | u64::from(*byte))
}

fn get<T>(row: &MySqlRow, index: usize) -> Result<Option<T>, sqlx::Error>
where
    T: for<'r> sqlx::Decode<'r, sqlx::MySql>,
{
    row.try_get_unchecked::<Option<T>, _>(index)
}
