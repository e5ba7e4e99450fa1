use tracing::{error, info};

use crate::error::EtlResult;
use crate::registry::{BuildContext, EntityType, SourceBinding};
use crate::schema::field_index_map;
use crate::storage::{NODES_GROUP, Storage};

/// Creates the node table of every discovered node type and binds its sources.
///
/// A table that cannot be created fails only its node type, which is recorded on the entity.
pub async fn materialize<S: Storage>(context: &mut BuildContext, storage: &S) {
    for entity in context.entities.iter_mut() {
        if entity.is_skipped() {
            continue;
        }

        if let Err(err) = materialize_entity(entity, storage).await {
            error!(entity = %entity.label, error = %err.summary(), "failed to create node table");
            entity.failure = Some(err);
        }
    }
}

/// Creates the table of one node type and computes the field index map of each source.
pub async fn materialize_entity<S: Storage>(entity: &mut EntityType, storage: &S) -> EtlResult<()> {
    let table = storage
        .create_table(NODES_GROUP, &entity.label, &entity.schema)
        .await?;

    for source in &entity.discovered {
        let field_names = source.field_names();
        let index_map = field_index_map(&entity.schema, &field_names);

        entity.bindings.push(SourceBinding {
            source_name: source.source_name.clone(),
            table: source.table.clone(),
            field_names,
            field_index_map: index_map,
            id_key: source.id_key.clone(),
            uri_key: source.uri_key.clone(),
            adapter: source.adapter.clone(),
        });
    }

    info!(
        entity = %entity.label,
        table = %table,
        bindings = entity.bindings.len(),
        "created node table"
    );
    entity.table = Some(table);

    Ok(())
}
