use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use duckdb::DuckdbConnectionManager;
use duckdb::types::{TimeUnit, Value};
use graphetl_config::shared::DatabaseConfig;
use r2d2::{Pool, PooledConnection};
use tracing::{debug, info};

use crate::error::{ErrorKind, EtlResult};
use crate::storage::duckdb::{build_create_table_sql, quote_identifier};
use crate::storage::{NODES_GROUP, RELATIONSHIPS_GROUP, Storage, TableHandle};
use crate::types::{CanonicalSchema, FieldValue, TableRecord};
use crate::{bail, etl_error};

/// File extension of the graph database artifact.
pub const DUCKDB_EXTENSION: &str = "duckdb";

/// Storage writing node tables into one DuckDB file.
///
/// An [`r2d2`] pool lets different tables be appended to from separate `spawn_blocking` tasks,
/// keeping DuckDB's synchronous API off the async runtime.
#[derive(Clone)]
pub struct DuckDbStorage {
    pool: Pool<DuckdbConnectionManager>,
    path: PathBuf,
    closed: Arc<AtomicBool>,
}

impl DuckDbStorage {
    /// Returns `{output_dir}/{name}-{version}.duckdb`.
    pub fn artifact_path(output_dir: &Path, database: &DatabaseConfig) -> PathBuf {
        output_dir.join(format!("{}.{DUCKDB_EXTENSION}", database.artifact_stem()))
    }

    /// Creates a fresh database file at `path`, replacing any existing one, with the node and
    /// relationship groups.
    pub async fn create(path: impl Into<PathBuf>, pool_size: u32) -> EtlResult<Self> {
        let path = path.into();
        let pool_path = path.clone();

        let pool = tokio::task::spawn_blocking(move || -> EtlResult<Pool<DuckdbConnectionManager>> {
            remove_existing(&pool_path)?;

            let manager = DuckdbConnectionManager::file(&pool_path).map_err(|e| {
                etl_error!(
                    ErrorKind::DestinationConnectionFailed,
                    "Failed to create DuckDB connection manager",
                    format!("file `{}`", pool_path.display()),
                    source: e
                )
            })?;
            let pool = Pool::builder().max_size(pool_size).build(manager).map_err(|e| {
                etl_error!(
                    ErrorKind::DestinationConnectionFailed,
                    "Failed to build DuckDB connection pool",
                    source: e
                )
            })?;

            let conn = get_connection(&pool)?;
            conn.execute_batch(&format!(
                "CREATE SCHEMA {}; CREATE SCHEMA {};",
                quote_identifier(NODES_GROUP),
                quote_identifier(RELATIONSHIPS_GROUP)
            ))
            .map_err(|e| {
                etl_error!(
                    ErrorKind::DestinationConnectionFailed,
                    "Failed to create DuckDB schemas",
                    source: e
                )
            })?;

            Ok(pool)
        })
        .await
        .map_err(|_| etl_error!(ErrorKind::InvalidState, "DuckDB blocking task panicked"))??;

        info!(path = %path.display(), "created graph database file");

        Ok(Self {
            pool,
            path,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> EtlResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            bail!(
                ErrorKind::DestinationClosed,
                "Storage is already closed",
                format!("file `{}`", self.path.display())
            );
        }

        Ok(())
    }
}

impl Storage for DuckDbStorage {
    fn name() -> &'static str {
        "duckdb"
    }

    async fn create_table(
        &self,
        group: &str,
        name: &str,
        schema: &CanonicalSchema,
    ) -> EtlResult<TableHandle> {
        self.ensure_open()?;

        let ddl = build_create_table_sql(group, name, schema);
        let pool = self.pool.clone();
        let qualified = format!("{group}.{name}");

        tokio::task::spawn_blocking(move || -> EtlResult<()> {
            let conn = get_connection(&pool)?;
            conn.execute_batch(&ddl).map_err(|e| {
                etl_error!(
                    ErrorKind::TableCreationFailed,
                    "DuckDB CREATE TABLE failed",
                    format!("table `{qualified}`"),
                    source: e
                )
            })?;
            Ok(())
        })
        .await
        .map_err(|_| etl_error!(ErrorKind::InvalidState, "DuckDB blocking task panicked"))??;

        debug!(group, table = name, columns = schema.len(), "created duckdb table");

        Ok(TableHandle::new(group, name, schema.clone()))
    }

    /// Bulk-inserts records through the DuckDB appender.
    async fn append_records(&self, table: &TableHandle, records: Vec<TableRecord>) -> EtlResult<()> {
        self.ensure_open()?;

        if records.is_empty() {
            return Ok(());
        }

        let pool = self.pool.clone();
        let group = table.group().to_string();
        let name = table.name().to_string();

        tokio::task::spawn_blocking(move || -> EtlResult<()> {
            let conn = get_connection(&pool)?;
            let mut appender = conn.appender_to_db(&name, &group).map_err(|e| {
                etl_error!(
                    ErrorKind::DestinationWriteFailed,
                    "Failed to create DuckDB appender",
                    format!("table `{group}.{name}`"),
                    source: e
                )
            })?;

            for record in records {
                let values: Vec<Value> = record
                    .into_values()
                    .into_iter()
                    .map(field_value_to_value)
                    .collect();

                appender
                    .append_row(duckdb::appender_params_from_iter(&values))
                    .map_err(|e| {
                        etl_error!(
                            ErrorKind::DestinationWriteFailed,
                            "DuckDB append_row failed",
                            source: e
                        )
                    })?;
            }

            appender.flush().map_err(|e| {
                etl_error!(
                    ErrorKind::DestinationWriteFailed,
                    "DuckDB appender flush failed",
                    source: e
                )
            })?;
            Ok(())
        })
        .await
        .map_err(|_| etl_error!(ErrorKind::InvalidState, "DuckDB blocking task panicked"))?
    }

    async fn row_count(&self, table: &TableHandle) -> EtlResult<u64> {
        self.ensure_open()?;

        let pool = self.pool.clone();
        let query = format!(
            "SELECT count(*) FROM {}.{}",
            quote_identifier(table.group()),
            quote_identifier(table.name())
        );

        tokio::task::spawn_blocking(move || -> EtlResult<u64> {
            let conn = get_connection(&pool)?;
            let count: i64 = conn.query_row(&query, [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
        .map_err(|_| etl_error!(ErrorKind::InvalidState, "DuckDB blocking task panicked"))?
    }

    /// Checkpoints the file so that it is complete without its write-ahead log.
    async fn close(&self) -> EtlResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            bail!(ErrorKind::DestinationClosed, "Storage is already closed");
        }

        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> EtlResult<()> {
            let conn = get_connection(&pool)?;
            conn.execute_batch("CHECKPOINT").map_err(|e| {
                etl_error!(
                    ErrorKind::DestinationWriteFailed,
                    "DuckDB checkpoint failed",
                    source: e
                )
            })?;
            Ok(())
        })
        .await
        .map_err(|_| etl_error!(ErrorKind::InvalidState, "DuckDB blocking task panicked"))??;

        info!(path = %self.path.display(), "closed graph database file");

        Ok(())
    }
}

fn get_connection(
    pool: &Pool<DuckdbConnectionManager>,
) -> EtlResult<PooledConnection<DuckdbConnectionManager>> {
    pool.get().map_err(|e| {
        etl_error!(
            ErrorKind::DestinationConnectionFailed,
            "Failed to get DuckDB connection from pool",
            source: e
        )
    })
}

/// Removes a previous artifact and its write-ahead log.
fn remove_existing(path: &Path) -> EtlResult<()> {
    let mut wal = path.as_os_str().to_owned();
    wal.push(".wal");

    for file in [path.to_path_buf(), PathBuf::from(wal)] {
        match std::fs::remove_file(&file) {
            Ok(()) => info!(path = %file.display(), "replaced existing file"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(etl_error!(
                    ErrorKind::DestinationConnectionFailed,
                    "Failed to remove existing graph database file",
                    format!("file `{}`", file.display()),
                    source: err
                ));
            }
        }
    }

    Ok(())
}

/// Converts a [`FieldValue`] into a DuckDB [`Value`] for the appender.
fn field_value_to_value(value: FieldValue) -> Value {
    match value {
        FieldValue::I8(v) => Value::TinyInt(v),
        FieldValue::I16(v) => Value::SmallInt(v),
        FieldValue::I32(v) => Value::Int(v),
        FieldValue::I64(v) => Value::BigInt(v),
        FieldValue::U8(v) => Value::UTinyInt(v),
        FieldValue::U16(v) => Value::USmallInt(v),
        FieldValue::U32(v) => Value::UInt(v),
        FieldValue::U64(v) => Value::UBigInt(v),
        FieldValue::F16(v) | FieldValue::F32(v) => Value::Float(v),
        FieldValue::F64(v) => Value::Double(v),
        FieldValue::String(v) => Value::Text(v),
        FieldValue::Bool(v) => Value::Boolean(v),
        FieldValue::Time64(micros) => Value::Timestamp(TimeUnit::Microsecond, micros),
    }
}
