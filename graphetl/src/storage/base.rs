use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::error::EtlResult;
use crate::types::{CanonicalSchema, TableRecord};

/// Group holding one table per node type label.
pub const NODES_GROUP: &str = "nodes";

/// Group reserved for relationship tables.
pub const RELATIONSHIPS_GROUP: &str = "relationships";

#[derive(Debug)]
struct TableHandleInner {
    group: String,
    name: String,
    schema: CanonicalSchema,
    writer: Mutex<()>,
}

/// Reference to a destination table and the lock serializing writes to it.
///
/// Clones share the same lock.
#[derive(Debug, Clone)]
pub struct TableHandle {
    inner: Arc<TableHandleInner>,
}

impl TableHandle {
    pub fn new(group: impl Into<String>, name: impl Into<String>, schema: CanonicalSchema) -> Self {
        Self {
            inner: Arc::new(TableHandleInner {
                group: group.into(),
                name: name.into(),
                schema,
                writer: Mutex::new(()),
            }),
        }
    }

    pub fn group(&self) -> &str {
        &self.inner.group
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn schema(&self) -> &CanonicalSchema {
        &self.inner.schema
    }

    /// Waits for exclusive write access to the table.
    pub async fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.inner.writer.lock().await
    }
}

impl fmt::Display for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.inner.group, self.inner.name)
    }
}

/// A destination that holds node tables.
///
/// Writers must hold [`TableHandle::lock_writer`] while appending. The storage is closed exactly
/// once, after which every operation fails.
pub trait Storage: Send + Sync {
    /// Returns the name of the storage engine.
    fn name() -> &'static str;

    /// Creates `group.name` with exactly the fields of `schema`.
    ///
    /// Fails with [`crate::error::ErrorKind::TableCreationFailed`] if the table exists or a type
    /// is not supported.
    fn create_table(
        &self,
        group: &str,
        name: &str,
        schema: &CanonicalSchema,
    ) -> impl Future<Output = EtlResult<TableHandle>> + Send;

    /// Appends complete records, in order.
    ///
    /// Fails with [`crate::error::ErrorKind::DestinationWriteFailed`].
    fn append_records(
        &self,
        table: &TableHandle,
        records: Vec<TableRecord>,
    ) -> impl Future<Output = EtlResult<()>> + Send;

    /// Returns the number of rows stored in the table.
    fn row_count(&self, table: &TableHandle) -> impl Future<Output = EtlResult<u64>> + Send;

    /// Flushes pending data and releases the destination.
    fn close(&self) -> impl Future<Output = EtlResult<()>> + Send;
}
