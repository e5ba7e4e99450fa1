use futures::future::join_all;
use graphetl_config::shared::{GraphConfig, NodeConfig, NodeSourceConfig};
use metrics::counter;
use tracing::{info, warn};

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, ErrorScope, EtlError, EtlResult};
use crate::etl_error;
use crate::metrics::{ENTITY_LABEL, ERROR_KIND_LABEL, GRAPHETL_SOURCE_FAILURES_TOTAL, SOURCE_LABEL};
use crate::registry::{BuildContext, DiscoveredSource, DroppedSource, EntityType, RelationshipType};
use crate::schema::{TypeMap, merge_fields};
use crate::source::SourceRegistry;

/// Discovers every node type of `graph` and records unsupported relationship types.
///
/// Node types are discovered concurrently. A schema conflict in any of them fails the whole
/// discovery, as does a shutdown request. Nothing is written anywhere.
pub async fn discover(
    graph: &GraphConfig,
    sources: &SourceRegistry,
    type_map: &TypeMap,
    mut shutdown_rx: ShutdownRx,
) -> EtlResult<BuildContext> {
    let mut context = BuildContext::new(graph.database.clone());

    let discoveries = join_all(
        graph
            .nodes
            .iter()
            .map(|(label, node)| {
                discover_entity(label.as_str(), node, graph, sources, type_map)
            }),
    );

    let results = tokio::select! {
        biased;

        _ = shutdown_rx.wait() => {
            return Err(etl_error!(ErrorKind::BuildCanceled, "Build canceled during discovery"));
        }
        results = discoveries => results,
    };

    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(entity) => context.entities.push(entity),
            Err(err) => errors.push(err),
        }
    }
    if !errors.is_empty() {
        return Err(errors.into());
    }

    for (label, relationship) in graph.relationships.iter() {
        if let Err(err) = RelationshipType::new(label, relationship) {
            warn!(relationship = %label, error = %err.summary(), "skipping relationship type");
            context.relationships.push((label.to_string(), err));
        }
    }

    Ok(context)
}

/// Discovers one node type: describes its sources concurrently, waits for all of them, then
/// merges their layouts.
///
/// Sources that cannot be reached, have an unsupported kind or an unmapped column type are
/// dropped. A node type without remaining sources is returned as skipped.
pub async fn discover_entity(
    label: &str,
    node: &NodeConfig,
    graph: &GraphConfig,
    sources: &SourceRegistry,
    type_map: &TypeMap,
) -> EtlResult<EntityType> {
    let described = join_all(node.sources.iter().map(|(source_name, table_config)| async move {
        let result = describe_source(source_name, table_config, graph, sources, type_map).await;
        (source_name.as_str(), table_config, result)
    }))
    .await;

    let mut discovered = Vec::new();
    let mut dropped = Vec::new();
    for (source_name, table_config, result) in described {
        match result {
            Ok(source) => discovered.push(source),
            Err(err) if err.kind().scope() == ErrorScope::Build => return Err(err),
            Err(err) => {
                warn!(
                    entity = label,
                    source = source_name,
                    table = %table_config.table,
                    error = %err.summary(),
                    "dropping source"
                );
                counter!(
                    GRAPHETL_SOURCE_FAILURES_TOTAL,
                    ENTITY_LABEL => label.to_string(),
                    SOURCE_LABEL => source_name.to_string(),
                    ERROR_KIND_LABEL => format!("{:?}", err.kind())
                )
                .increment(1);
                dropped.push(DroppedSource {
                    source_name: source_name.to_string(),
                    table: table_config.table.clone(),
                    error: err,
                });
            }
        }
    }

    let schema = merge_fields(discovered.iter().map(|source| source.fields.as_slice()))
        .map_err(|err| {
            etl_error!(
                ErrorKind::SchemaConflict,
                "Sources disagree on a field type",
                format!("node type `{label}`: {err}"),
                source: err
            )
        })?;

    if discovered.is_empty() {
        warn!(entity = label, "no readable source left, node type will be skipped");
    } else {
        info!(
            entity = label,
            sources = discovered.len(),
            dropped = dropped.len(),
            columns = schema.len(),
            "discovered node type"
        );
    }

    let mut entity = EntityType::new(label, schema);
    entity.discovered = discovered;
    entity.dropped = dropped;

    Ok(entity)
}

async fn describe_source(
    source_name: &str,
    table_config: &NodeSourceConfig,
    graph: &GraphConfig,
    sources: &SourceRegistry,
    type_map: &TypeMap,
) -> EtlResult<DiscoveredSource> {
    let Some(source_config) = graph.sources.get(source_name) else {
        return Err(etl_error!(
            ErrorKind::SourceUnavailable,
            "Source is not declared",
            format!("source `{source_name}`")
        ));
    };

    let adapter = sources.connect(source_name, source_config).await?;
    let native_fields = adapter.describe_schema(&table_config.table).await?;
    let fields = type_map.resolve_fields(&native_fields).map_err(|err: EtlError| {
        etl_error!(
            err.kind(),
            "Source table has an unmapped column type",
            format!(
                "table `{}` of source `{source_name}`: {}",
                table_config.table,
                err.detail().unwrap_or_default()
            )
        )
    })?;

    Ok(DiscoveredSource::new(table_config, fields, adapter))
}
