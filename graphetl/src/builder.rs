use std::collections::HashMap;
use std::path::PathBuf;

use graphetl_config::shared::{BuildSettings, ValidatedGraphConfig};
use tracing::{error, info, warn};

use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::ingestion::engine::IngestionJob;
use crate::ingestion::pool::{IngestionPool, JobKey};
use crate::registry::discovery::discover;
use crate::registry::materialize::materialize;
use crate::registry::{BuildContext, EntityType};
use crate::report::{BuildReport, EntityReport, RelationshipReport, SourceOutcome, SourceReport};
use crate::schema::TypeMap;
use crate::source::SourceRegistry;
use crate::storage::Storage;
use crate::storage::duckdb::DuckDbStorage;

/// Drives one build of a graph database: discovery, then ingestion into a storage.
///
/// Discovery never touches the storage, so a schema conflict leaves no file behind.
#[derive(Debug)]
pub struct GraphBuilder {
    graph: ValidatedGraphConfig,
    settings: BuildSettings,
    sources: SourceRegistry,
    shutdown_tx: ShutdownTx,
}

impl GraphBuilder {
    /// Creates a builder after validating `settings`.
    pub fn new(
        graph: ValidatedGraphConfig,
        settings: BuildSettings,
        sources: SourceRegistry,
    ) -> EtlResult<Self> {
        settings.validate()?;
        let (shutdown_tx, _) = create_shutdown_channel();

        Ok(Self {
            graph,
            settings,
            sources,
            shutdown_tx,
        })
    }

    /// Returns the transmitter that cancels the build.
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Returns where [`GraphBuilder::build`] writes the database file.
    pub fn artifact_path(&self) -> PathBuf {
        DuckDbStorage::artifact_path(&self.settings.output_dir, &self.graph.database)
    }

    /// Describes every source and harmonizes the schema of every node type.
    pub async fn discover(&self) -> EtlResult<BuildContext> {
        let type_map = TypeMap::from_settings(&self.settings)?;

        info!(
            nodes = self.graph.nodes.len(),
            relationships = self.graph.relationships.len(),
            "starting discovery"
        );

        discover(&self.graph, &self.sources, &type_map, self.shutdown_tx.subscribe()).await
    }

    /// Creates the node tables of `context` in `storage` and streams every bound source.
    ///
    /// The storage is closed exactly once before returning, whatever the outcome.
    pub async fn ingest<S>(&self, context: &mut BuildContext, storage: &S) -> EtlResult<BuildReport>
    where
        S: Storage + Clone + 'static,
    {
        let result = self.run_ingestion(context, storage).await;
        let closed = storage.close().await;
        if let Err(err) = &closed {
            error!(storage = S::name(), error = %err.summary(), "failed to close storage");
        }

        match (result, closed) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => Err(vec![err, close_err].into()),
        }
    }

    /// Runs a whole build into a fresh DuckDB file under the configured output directory.
    pub async fn build(&self) -> EtlResult<BuildReport> {
        let mut context = self.discover().await?;

        std::fs::create_dir_all(&self.settings.output_dir).map_err(|err| {
            etl_error!(
                ErrorKind::DestinationConnectionFailed,
                "Failed to create the output directory",
                format!("directory `{}`", self.settings.output_dir.display()),
                source: err
            )
        })?;

        let path = self.artifact_path();
        let pool_size = u32::from(self.settings.max_workers) + 1;
        let storage = DuckDbStorage::create(path.clone(), pool_size).await?;

        let mut report = self.ingest(&mut context, &storage).await?;
        report.database_file = Some(path);

        Ok(report)
    }

    async fn run_ingestion<S>(&self, context: &mut BuildContext, storage: &S) -> EtlResult<BuildReport>
    where
        S: Storage + Clone + 'static,
    {
        materialize(context, storage).await;

        let mut pool = IngestionPool::new(self.settings.max_workers);
        for (entity_index, entity) in context.entities.iter().enumerate() {
            let Some(table) = &entity.table else {
                continue;
            };

            let (entity_abort, _) = create_shutdown_channel();
            for (source_index, binding) in entity.bindings.iter().enumerate() {
                let job = IngestionJob {
                    label: entity.label.clone(),
                    binding: binding.clone(),
                    table: table.clone(),
                    storage: storage.clone(),
                    batch_size: self.settings.batch.max_size,
                    shutdown_rx: self.shutdown_tx.subscribe(),
                    entity_abort: entity_abort.clone(),
                };
                let key = JobKey {
                    entity: entity_index,
                    source: source_index,
                };

                pool.spawn(key, job).await?;
            }
        }

        let mut outcomes: HashMap<JobKey, SourceOutcome> =
            pool.wait_all().await.into_iter().collect();

        let entities = context
            .entities
            .iter()
            .enumerate()
            .map(|(entity_index, entity)| entity_report(entity, entity_index, &mut outcomes))
            .collect();

        let relationships = context
            .relationships
            .iter()
            .map(|(label, err)| RelationshipReport {
                label: label.clone(),
                kind: err.kind(),
                reason: err.summary(),
            })
            .collect();

        let report = BuildReport {
            database_file: None,
            canceled: self.shutdown_tx.is_shutdown(),
            entities,
            relationships,
        };
        log_summary(&report);

        Ok(report)
    }
}

/// Builds the report of one node type from the outcomes of its bindings, in binding order.
fn entity_report(
    entity: &EntityType,
    entity_index: usize,
    outcomes: &mut HashMap<JobKey, SourceOutcome>,
) -> EntityReport {
    let mut sources = Vec::new();

    match &entity.failure {
        Some(failure) => {
            for source in &entity.discovered {
                sources.push(SourceReport {
                    source: source.source_name.clone(),
                    table: source.table.clone(),
                    outcome: SourceOutcome::skipped(failure),
                });
            }
        }
        None => {
            for (source_index, binding) in entity.bindings.iter().enumerate() {
                let key = JobKey {
                    entity: entity_index,
                    source: source_index,
                };
                let outcome = outcomes.remove(&key).unwrap_or_else(|| SourceOutcome::Interrupted {
                    appended: 0,
                    discarded: 0,
                    coerced: 0,
                    kind: ErrorKind::InvalidState,
                    reason: "Ingestion task did not report an outcome".to_string(),
                });

                sources.push(SourceReport {
                    source: binding.source_name.clone(),
                    table: binding.table.clone(),
                    outcome,
                });
            }
        }
    }

    for dropped in &entity.dropped {
        sources.push(SourceReport {
            source: dropped.source_name.clone(),
            table: dropped.table.clone(),
            outcome: SourceOutcome::skipped(&dropped.error),
        });
    }

    EntityReport::new(
        entity.label.clone(),
        entity.schema.clone(),
        sources,
        entity.failure.as_ref(),
    )
}

fn log_summary(report: &BuildReport) {
    for entity in &report.entities {
        info!(
            entity = %entity.label,
            status = ?entity.status,
            appended = entity.appended(),
            discarded = entity.discarded(),
            "node type summary"
        );
    }

    for relationship in &report.relationships {
        warn!(relationship = %relationship.label, reason = %relationship.reason, "relationship type not built");
    }

    if report.canceled {
        error!(appended = report.total_appended(), "build canceled, tables are partially ingested");
    } else {
        info!(
            appended = report.total_appended(),
            complete = report.is_complete(),
            "build finished"
        );
    }
}

/// Returns whether `err` was caused by a shutdown request.
pub fn is_canceled(err: &EtlError) -> bool {
    err.kinds().contains(&ErrorKind::BuildCanceled)
}
