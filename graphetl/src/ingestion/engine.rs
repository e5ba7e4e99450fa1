use std::time::Instant;

use futures::StreamExt;
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::concurrency::shutdown::{ShutdownResult, ShutdownRx, ShutdownTx};
use crate::error::{ErrorKind, ErrorScope, EtlError, EtlResult};
use crate::{ensure, etl_error};
use crate::ingestion::record::{RecordBuilder, RecordError};
use crate::metrics::{
    ENTITY_LABEL, ERROR_KIND_LABEL, GRAPHETL_BATCH_WRITE_DURATION_SECONDS,
    GRAPHETL_ROWS_APPENDED_TOTAL, GRAPHETL_ROWS_DISCARDED_TOTAL,
    GRAPHETL_SOURCE_FAILURES_TOTAL, GRAPHETL_SOURCE_INGESTION_DURATION_SECONDS,
    GRAPHETL_VALUES_COERCED_TOTAL, SOURCE_LABEL,
};
use crate::registry::SourceBinding;
use crate::report::SourceOutcome;
use crate::storage::{Storage, TableHandle};
use crate::types::{SourceRow, TableRecord};

/// Everything needed to stream one bound source into its node table.
#[derive(Debug)]
pub struct IngestionJob<S> {
    pub label: String,
    pub binding: SourceBinding,
    pub table: TableHandle,
    pub storage: S,
    pub batch_size: usize,
    /// Build-wide cancellation.
    pub shutdown_rx: ShutdownRx,
    /// Abort signal shared by every job of the same node type.
    pub entity_abort: ShutdownTx,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    appended: u64,
    discarded: u64,
    coerced: u64,
}

impl Counts {
    fn ingested(self) -> SourceOutcome {
        SourceOutcome::Ingested {
            appended: self.appended,
            discarded: self.discarded,
            coerced: self.coerced,
        }
    }

    fn interrupted(self, err: &EtlError) -> SourceOutcome {
        SourceOutcome::Interrupted {
            appended: self.appended,
            discarded: self.discarded,
            coerced: self.coerced,
            kind: err.kind(),
            reason: err.summary(),
        }
    }
}

/// Streams every row of one source into its node table.
///
/// Rows are appended in source order, in batches, while holding the table's writer lock. A row
/// that cannot be coerced is discarded and counted. A broken stream stops this source only. A
/// failed write stops this source and signals every other source of the node type to stop.
/// Cancellation is checked between rows; rows already appended stay.
pub async fn ingest_source<S>(job: IngestionJob<S>) -> SourceOutcome
where
    S: Storage,
{
    let started = Instant::now();
    let IngestionJob {
        label,
        binding,
        table,
        storage,
        batch_size,
        mut shutdown_rx,
        entity_abort,
    } = job;
    let mut abort_rx = entity_abort.subscribe();

    let mut writer = BatchWriter {
        label: &label,
        source_name: &binding.source_name,
        table: &table,
        storage: &storage,
        pending: Vec::with_capacity(batch_size),
        batch_size,
        counts: Counts::default(),
    };

    let outcome = async {
        // A job that waited for a worker may start after the build was stopped.
        ensure!(
            !shutdown_rx.is_shutdown(),
            ErrorKind::BuildCanceled,
            "Build canceled before streaming"
        );
        ensure!(
            !abort_rx.is_shutdown(),
            ErrorKind::EntityAborted,
            "Node type aborted after a failed write"
        );

        let mut stream = binding.adapter.stream_rows(&binding.table).await?;
        let builder = RecordBuilder::new(table.schema(), &binding);

        loop {
            let next = tokio::select! {
                biased;

                _ = shutdown_rx.wait() => ShutdownResult::Shutdown(etl_error!(
                    ErrorKind::BuildCanceled,
                    "Build canceled while streaming"
                )),
                _ = abort_rx.wait() => ShutdownResult::Shutdown(etl_error!(
                    ErrorKind::EntityAborted,
                    "Node type aborted after a failed write"
                )),
                item = stream.next() => ShutdownResult::Ok(item),
            };

            let item = match next {
                ShutdownResult::Ok(Some(item)) => item,
                ShutdownResult::Ok(None) => break,
                ShutdownResult::Shutdown(err) => {
                    if err.kind() == ErrorKind::BuildCanceled {
                        writer.flush().await?;
                    }
                    return Err(err);
                }
            };

            match item {
                Ok(row) => writer.push(&builder, &row, &binding).await?,
                Err(err) if err.kind().scope() == ErrorScope::Row => {
                    writer.discard(&err);
                }
                Err(err) => {
                    writer.flush().await?;
                    return Err(stream_error(err));
                }
            }
        }

        writer.flush().await?;
        EtlResult::Ok(())
    }
    .await;

    let counts = writer.counts;
    histogram!(
        GRAPHETL_SOURCE_INGESTION_DURATION_SECONDS,
        ENTITY_LABEL => label.clone(),
        SOURCE_LABEL => binding.source_name.clone()
    )
    .record(started.elapsed().as_secs_f64());

    match outcome {
        Ok(()) => {
            if counts.discarded > 0 {
                warn!(
                    entity = %label,
                    source = %binding.source_name,
                    discarded = counts.discarded,
                    "rows discarded because values could not be coerced"
                );
            }
            info!(
                entity = %label,
                source = %binding.source_name,
                table = %binding.table,
                appended = counts.appended,
                coerced = counts.coerced,
                "completed source ingestion"
            );
            counts.ingested()
        }
        Err(err) => {
            match err.kind() {
                ErrorKind::DestinationWriteFailed
                | ErrorKind::DestinationConnectionFailed
                | ErrorKind::DestinationClosed => {
                    entity_abort.shutdown();
                    warn!(
                        entity = %label,
                        source = %binding.source_name,
                        error = %err.summary(),
                        "write failed, aborting node type"
                    );
                }
                ErrorKind::BuildCanceled | ErrorKind::EntityAborted => {
                    info!(
                        entity = %label,
                        source = %binding.source_name,
                        appended = counts.appended,
                        reason = %err.description(),
                        "stopped source ingestion"
                    );
                }
                _ => {
                    warn!(
                        entity = %label,
                        source = %binding.source_name,
                        appended = counts.appended,
                        error = %err.summary(),
                        "source stream failed, keeping rows appended so far"
                    );
                }
            }

            counter!(
                GRAPHETL_SOURCE_FAILURES_TOTAL,
                ENTITY_LABEL => label.clone(),
                SOURCE_LABEL => binding.source_name.clone(),
                ERROR_KIND_LABEL => format!("{:?}", err.kind())
            )
            .increment(1);

            counts.interrupted(&err)
        }
    }
}

/// Wraps a source error that ends the stream as [`ErrorKind::SourceStreamFailed`].
fn stream_error(err: EtlError) -> EtlError {
    if err.kind() == ErrorKind::SourceStreamFailed {
        return err;
    }

    etl_error!(
        ErrorKind::SourceStreamFailed,
        "Source stream failed",
        err.summary(),
        source: err
    )
}

struct BatchWriter<'a, S> {
    label: &'a str,
    source_name: &'a str,
    table: &'a TableHandle,
    storage: &'a S,
    pending: Vec<TableRecord>,
    batch_size: usize,
    counts: Counts,
}

impl<S: Storage> BatchWriter<'_, S> {
    async fn push(
        &mut self,
        builder: &RecordBuilder,
        row: &SourceRow,
        binding: &SourceBinding,
    ) -> EtlResult<()> {
        match builder.build(row) {
            Ok(built) => {
                self.counts.coerced += built.coerced;
                if built.coerced > 0 {
                    counter!(
                        GRAPHETL_VALUES_COERCED_TOTAL,
                        ENTITY_LABEL => self.label.to_string(),
                        SOURCE_LABEL => self.source_name.to_string()
                    )
                    .increment(built.coerced);
                }

                self.pending.push(built.record);
                if self.pending.len() >= self.batch_size {
                    self.flush().await?;
                }

                Ok(())
            }
            Err(RecordError::Coercion(err)) => {
                let err: EtlError = err.into();
                self.discard(&err);
                Ok(())
            }
            Err(err @ RecordError::Layout { .. }) => {
                self.flush().await?;
                Err(etl_error!(
                    ErrorKind::SourceStreamFailed,
                    "Source row does not match its described layout",
                    format!(
                        "table `{}` of source `{}`: {err}",
                        binding.table, binding.source_name
                    ),
                    source: err
                ))
            }
        }
    }

    fn discard(&mut self, err: &EtlError) {
        self.counts.discarded += 1;
        debug!(
            entity = self.label,
            source = self.source_name,
            error = %err.summary(),
            "discarded row"
        );
        counter!(
            GRAPHETL_ROWS_DISCARDED_TOTAL,
            ENTITY_LABEL => self.label.to_string(),
            SOURCE_LABEL => self.source_name.to_string()
        )
        .increment(1);
    }

    async fn flush(&mut self) -> EtlResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let records = std::mem::take(&mut self.pending);
        let count = records.len() as u64;
        let started = Instant::now();

        {
            let _guard = self.table.lock_writer().await;
            self.storage.append_records(self.table, records).await?;
        }

        self.counts.appended += count;
        counter!(
            GRAPHETL_ROWS_APPENDED_TOTAL,
            ENTITY_LABEL => self.label.to_string(),
            SOURCE_LABEL => self.source_name.to_string()
        )
        .increment(count);
        histogram!(
            GRAPHETL_BATCH_WRITE_DURATION_SECONDS,
            ENTITY_LABEL => self.label.to_string()
        )
        .record(started.elapsed().as_secs_f64());

        Ok(())
    }
}
