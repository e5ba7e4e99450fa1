use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::ingestion::engine::{IngestionJob, ingest_source};
use crate::report::SourceOutcome;
use crate::storage::Storage;

/// Position of a job's source in the build: node type index, then binding index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobKey {
    pub entity: usize,
    pub source: usize,
}

/// Runs ingestion jobs on at most `max_workers` concurrent tasks.
///
/// Each job holds a permit for its whole run. Jobs of the same node type may run concurrently,
/// their writes are serialized by the table's writer lock.
#[derive(Debug)]
pub struct IngestionPool {
    permits: Arc<Semaphore>,
    join_set: JoinSet<(JobKey, SourceOutcome)>,
}

impl IngestionPool {
    pub fn new(max_workers: u16) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(usize::from(max_workers.max(1)))),
            join_set: JoinSet::new(),
        }
    }

    /// Spawns `job` once a worker is free.
    pub async fn spawn<S>(&mut self, key: JobKey, job: IngestionJob<S>) -> EtlResult<()>
    where
        S: Storage + 'static,
    {
        let permit = self.permits.clone().acquire_owned().await.map_err(|err| {
            etl_error!(
                ErrorKind::InvalidState,
                "Could not acquire an ingestion worker",
                err.to_string()
            )
        })?;

        debug!(entity = %job.label, source = %job.binding.source_name, "spawning ingestion job");

        self.join_set.spawn(async move {
            let outcome = AssertUnwindSafe(ingest_source(job))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    error!(?key, "ingestion worker panicked");
                    SourceOutcome::Interrupted {
                        appended: 0,
                        discarded: 0,
                        coerced: 0,
                        kind: ErrorKind::IngestionWorkerPanic,
                        reason: "Ingestion worker panicked".to_string(),
                    }
                });

            drop(permit);

            (key, outcome)
        });

        Ok(())
    }

    /// Waits for every spawned job and returns their outcomes ordered by key.
    pub async fn wait_all(mut self) -> Vec<(JobKey, SourceOutcome)> {
        let mut outcomes = Vec::with_capacity(self.join_set.len());

        while let Some(result) = self.join_set.join_next().await {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                // Panics are caught inside the task, only cancellation reaches here.
                Err(join_err) => error!(error = %join_err, "ingestion task did not complete"),
            }
        }

        outcomes.sort_by_key(|(key, _)| *key);
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::concurrency::shutdown::create_shutdown_channel;
    use crate::registry::SourceBinding;
    use crate::source::memory::{MemorySource, MemorySourceConnector, MemoryTable};
    use crate::source::SourceConnector;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::NODES_GROUP;
    use crate::types::{CanonicalField, CanonicalSchema, CanonicalType, Cell, SourceRow};
    use graphetl_config::shared::SourceConfig;

    async fn binding(connector: &MemorySourceConnector, name: &str) -> SourceBinding {
        let adapter = connector
            .connect(name, &SourceConfig::new(MemorySourceConnector::KIND))
            .await
            .unwrap();

        SourceBinding {
            source_name: name.to_string(),
            table: "t".to_string(),
            field_names: vec!["a".to_string()],
            field_index_map: vec![Some(0)],
            id_key: None,
            uri_key: None,
            adapter,
        }
    }

    #[tokio::test]
    async fn test_runs_every_job_with_bounded_workers() {
        let table = || {
            MemoryTable::new([("a", "INT")])
                .with_rows((0..5).map(|i| SourceRow::new(vec![Cell::I32(i)])))
                .with_row_delay(Duration::from_millis(1))
        };
        let connector = MemorySourceConnector::default()
            .with_source("s1", MemorySource::new().with_table("t", table()))
            .with_source("s2", MemorySource::new().with_table("t", table()))
            .with_source("s3", MemorySource::new().with_table("t", table()));

        let storage = MemoryStorage::new();
        let schema = CanonicalSchema::new(vec![CanonicalField::new("a", CanonicalType::Int32)]);
        let handle = storage.create_table(NODES_GROUP, "A", &schema).await.unwrap();
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let (entity_abort, _) = create_shutdown_channel();

        let mut pool = IngestionPool::new(2);
        for (index, name) in ["s3", "s1", "s2"].into_iter().enumerate() {
            let job = IngestionJob {
                label: "A".to_string(),
                binding: binding(&connector, name).await,
                table: handle.clone(),
                storage: storage.clone(),
                batch_size: 2,
                shutdown_rx: shutdown_rx.clone(),
                entity_abort: entity_abort.clone(),
            };
            pool.spawn(JobKey { entity: 0, source: index }, job).await.unwrap();
        }

        let outcomes = pool.wait_all().await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().enumerate().all(|(i, (key, _))| key.source == i));
        assert!(outcomes.iter().all(|(_, outcome)| outcome.is_complete()));
        assert_eq!(storage.records(NODES_GROUP, "A").await.len(), 15);
    }
}
