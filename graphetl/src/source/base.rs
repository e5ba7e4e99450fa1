use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use graphetl_config::shared::SourceConfig;

use crate::error::EtlResult;
use crate::types::{SourceField, SourceRow};

/// One-pass sequence of rows of a source table.
///
/// Errors whose kind has row scope discard a single row. Any other error ends the stream.
pub type RowStream = BoxStream<'static, EtlResult<SourceRow>>;

/// Read access to the tables of one configured source.
///
/// An adapter serves one reader at a time: a stream must be drained or dropped before the next
/// call.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Returns the configured name of the source.
    fn source_name(&self) -> &str;

    /// Describes the columns of `table` in result order.
    ///
    /// Fails with [`crate::error::ErrorKind::SourceUnavailable`] when the table cannot be read.
    async fn describe_schema(&self, table: &str) -> EtlResult<Vec<SourceField>>;

    /// Streams every row of `table`, each aligned with [`SourceAdapter::describe_schema`].
    async fn stream_rows(&self, table: &str) -> EtlResult<RowStream>;
}

/// Opens [`SourceAdapter`]s for one kind of source.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Returns the `source type` this connector serves.
    fn kind(&self) -> &str;

    /// Connects to the source called `source_name`.
    async fn connect(
        &self,
        source_name: &str,
        config: &SourceConfig,
    ) -> EtlResult<Arc<dyn SourceAdapter>>;
}
