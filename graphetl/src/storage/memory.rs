use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::storage::{Storage, TableHandle};
use crate::types::{CanonicalSchema, TableRecord};

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<(String, String), (CanonicalSchema, Vec<TableRecord>)>,
    failing_creates: HashSet<String>,
    failing_appends: HashSet<String>,
    close_calls: usize,
}

/// In-memory storage for tests and dry runs.
///
/// Tables can be set up to fail creation or appends by name, and close calls are counted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes creating any table called `name` fail.
    pub async fn fail_create(&self, name: impl Into<String>) {
        self.inner.lock().await.failing_creates.insert(name.into());
    }

    /// Makes appending to any table called `name` fail.
    pub async fn fail_appends(&self, name: impl Into<String>) {
        self.inner.lock().await.failing_appends.insert(name.into());
    }

    /// Returns the schema of `group.name`, if created.
    pub async fn table_schema(&self, group: &str, name: &str) -> Option<CanonicalSchema> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .get(&(group.to_string(), name.to_string()))
            .map(|(schema, _)| schema.clone())
    }

    /// Returns a copy of the records of `group.name`.
    pub async fn records(&self, group: &str, name: &str) -> Vec<TableRecord> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .get(&(group.to_string(), name.to_string()))
            .map(|(_, records)| records.clone())
            .unwrap_or_default()
    }

    /// Returns every created table as `group.name`.
    pub async fn table_names(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .keys()
            .map(|(group, name)| format!("{group}.{name}"))
            .collect()
    }

    pub async fn close_calls(&self) -> usize {
        self.inner.lock().await.close_calls
    }
}

impl Storage for MemoryStorage {
    fn name() -> &'static str {
        "memory"
    }

    async fn create_table(
        &self,
        group: &str,
        name: &str,
        schema: &CanonicalSchema,
    ) -> EtlResult<TableHandle> {
        let mut inner = self.inner.lock().await;
        ensure_open(&inner)?;

        let key = (group.to_string(), name.to_string());
        if inner.failing_creates.contains(name) || inner.tables.contains_key(&key) {
            bail!(
                ErrorKind::TableCreationFailed,
                "Destination table could not be created",
                format!("table `{group}.{name}`")
            );
        }

        inner.tables.insert(key, (schema.clone(), Vec::new()));

        Ok(TableHandle::new(group, name, schema.clone()))
    }

    async fn append_records(&self, table: &TableHandle, records: Vec<TableRecord>) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        ensure_open(&inner)?;

        if inner.failing_appends.contains(table.name()) {
            bail!(
                ErrorKind::DestinationWriteFailed,
                "Destination write failed",
                format!("table `{table}`")
            );
        }

        let key = (table.group().to_string(), table.name().to_string());
        let Some((_, stored)) = inner.tables.get_mut(&key) else {
            bail!(
                ErrorKind::DestinationWriteFailed,
                "Destination table does not exist",
                format!("table `{table}`")
            );
        };
        stored.extend(records);

        Ok(())
    }

    async fn row_count(&self, table: &TableHandle) -> EtlResult<u64> {
        let inner = self.inner.lock().await;
        let key = (table.group().to_string(), table.name().to_string());

        Ok(inner
            .tables
            .get(&key)
            .map(|(_, records)| records.len() as u64)
            .unwrap_or(0))
    }

    async fn close(&self) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        ensure_open(&inner)?;
        inner.close_calls += 1;

        info!(tables = inner.tables.len(), "closed memory storage");

        Ok(())
    }
}

fn ensure_open(inner: &Inner) -> EtlResult<()> {
    if inner.close_calls > 0 {
        bail!(ErrorKind::DestinationClosed, "Storage is already closed");
    }

    Ok(())
}
