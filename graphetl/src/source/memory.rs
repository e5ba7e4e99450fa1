use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use graphetl_config::shared::SourceConfig;
use tracing::debug;

use crate::error::{ErrorKind, EtlResult};
use crate::source::{RowStream, SourceAdapter, SourceConnector};
use crate::types::{Cell, SourceField, SourceRow};
use crate::{bail, etl_error};

/// A table held in memory, with optional injected failures.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    fields: Vec<SourceField>,
    rows: Vec<SourceRow>,
    unavailable: bool,
    fail_after: Option<usize>,
    row_delay: Option<Duration>,
}

impl MemoryTable {
    /// Creates an empty table with the given `(name, native type)` columns.
    pub fn new<N, T>(fields: impl IntoIterator<Item = (N, T)>) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, native_type)| SourceField::new(name, native_type))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_row(mut self, values: impl IntoIterator<Item = Cell>) -> Self {
        self.rows.push(SourceRow::new(values.into_iter().collect()));
        self
    }

    pub fn with_rows(mut self, rows: impl IntoIterator<Item = SourceRow>) -> Self {
        self.rows.extend(rows);
        self
    }

    /// Makes describing the table fail as if it did not exist.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Makes the stream fail after yielding `rows` rows.
    pub fn fail_stream_after(mut self, rows: usize) -> Self {
        self.fail_after = Some(rows);
        self
    }

    /// Waits `delay` before yielding each row.
    pub fn with_row_delay(mut self, delay: Duration) -> Self {
        self.row_delay = Some(delay);
        self
    }
}

/// A named set of in-memory tables.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<String, MemoryTable>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, table: MemoryTable) -> Self {
        self.tables.insert(name.into(), table);
        self
    }
}

/// Connector of the `memory` source type, used for dry runs and tests.
///
/// Sources are resolved by their configured name. Every connection is counted.
#[derive(Debug, Clone, Default)]
pub struct MemorySourceConnector {
    sources: Arc<HashMap<String, MemorySource>>,
    connections: Arc<AtomicUsize>,
}

impl MemorySourceConnector {
    pub const KIND: &'static str = "memory";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, name: impl Into<String>, source: MemorySource) -> Self {
        Arc::make_mut(&mut self.sources).insert(name.into(), source);
        self
    }

    /// Returns how many adapters were opened so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceConnector for MemorySourceConnector {
    fn kind(&self) -> &str {
        Self::KIND
    }

    async fn connect(
        &self,
        source_name: &str,
        _config: &SourceConfig,
    ) -> EtlResult<Arc<dyn SourceAdapter>> {
        let Some(source) = self.sources.get(source_name) else {
            bail!(
                ErrorKind::SourceUnavailable,
                "Source is not reachable",
                format!("no in-memory source named `{source_name}`")
            );
        };

        self.connections.fetch_add(1, Ordering::SeqCst);
        debug!(source = source_name, "opened in-memory source");

        Ok(Arc::new(MemorySourceAdapter {
            source_name: source_name.to_string(),
            source: source.clone(),
        }))
    }
}

/// Adapter over a [`MemorySource`].
#[derive(Debug, Clone)]
pub struct MemorySourceAdapter {
    source_name: String,
    source: MemorySource,
}

impl MemorySourceAdapter {
    fn table(&self, table: &str) -> EtlResult<&MemoryTable> {
        match self.source.tables.get(table) {
            Some(memory_table) if !memory_table.unavailable => Ok(memory_table),
            _ => Err(etl_error!(
                ErrorKind::SourceUnavailable,
                "Source table is not readable",
                format!("table `{table}` of source `{}`", self.source_name)
            )),
        }
    }
}

#[async_trait]
impl SourceAdapter for MemorySourceAdapter {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    async fn describe_schema(&self, table: &str) -> EtlResult<Vec<SourceField>> {
        Ok(self.table(table)?.fields.clone())
    }

    async fn stream_rows(&self, table: &str) -> EtlResult<RowStream> {
        let memory_table = self.table(table)?.clone();
        let table = table.to_string();

        let stream = futures::stream::unfold(
            (memory_table, 0usize, false),
            move |(memory_table, index, failed)| {
                let table = table.clone();
                async move {
                    if failed {
                        return None;
                    }

                    if memory_table.fail_after == Some(index) {
                        let err = etl_error!(
                            ErrorKind::SourceStreamFailed,
                            "Source stream broke",
                            format!("injected failure after {index} rows of `{table}`")
                        );
                        return Some((Err(err), (memory_table, index, true)));
                    }

                    let row = memory_table.rows.get(index).cloned()?;
                    if let Some(delay) = memory_table.row_delay {
                        tokio::time::sleep(delay).await;
                    }

                    Some((Ok(row), (memory_table, index + 1, false)))
                }
            },
        );

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;

    fn people() -> MemorySource {
        MemorySource::new().with_table(
            "people",
            MemoryTable::new([("id", "LONG"), ("name", "VAR_STRING")])
                .with_row([Cell::I32(1), Cell::from("Ana")])
                .with_row([Cell::I32(2), Cell::from("Bo")]),
        )
    }

    #[tokio::test]
    async fn test_describe_and_stream() {
        let connector = MemorySourceConnector::new().with_source("crm", people());
        let adapter = connector
            .connect("crm", &SourceConfig::new("memory"))
            .await
            .unwrap();

        let fields = adapter.describe_schema("people").await.unwrap();
        assert_eq!(fields[1], SourceField::new("name", "VAR_STRING"));

        let rows: Vec<SourceRow> = adapter
            .stream_rows("people")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].values()[1], Cell::from("Bo"));
        assert_eq!(connector.connections(), 1);
    }

    #[tokio::test]
    async fn test_missing_table_is_unavailable() {
        let connector = MemorySourceConnector::new().with_source("crm", people());
        let adapter = connector
            .connect("crm", &SourceConfig::new("memory"))
            .await
            .unwrap();

        let err = adapter.describe_schema("orders").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    }

    #[tokio::test]
    async fn test_injected_stream_failure_ends_stream() {
        let source = MemorySource::new().with_table(
            "t",
            MemoryTable::new([("id", "LONG")])
                .with_row([Cell::I32(1)])
                .with_row([Cell::I32(2)])
                .fail_stream_after(1),
        );
        let connector = MemorySourceConnector::new().with_source("s", source);
        let adapter = connector
            .connect("s", &SourceConfig::new("memory"))
            .await
            .unwrap();

        let items: Vec<EtlResult<SourceRow>> =
            adapter.stream_rows("t").await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert_eq!(
            items[1].as_ref().unwrap_err().kind(),
            ErrorKind::SourceStreamFailed
        );
    }
}
