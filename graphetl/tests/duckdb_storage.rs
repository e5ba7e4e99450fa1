mod common;

use graphetl::error::ErrorKind;
use graphetl::report::EntityStatus;
use graphetl::storage::duckdb::DuckDbStorage;
use graphetl::storage::{NODES_GROUP, Storage};
use graphetl::types::{
    CanonicalField, CanonicalSchema, CanonicalType, FieldValue, TableRecord,
};
use graphetl_telemetry::tracing::init_test_tracing;

use crate::common::{PERSON_GRAPH, builder_with, person_connector, test_settings};

fn open(path: &std::path::Path) -> duckdb::Connection {
    duckdb::Connection::open(path).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_build_writes_one_file_with_node_tables() {
    init_test_tracing();

    let output_dir = tempfile::tempdir().unwrap();
    let mut settings = test_settings();
    settings.output_dir = output_dir.path().join("out");
    let builder = builder_with(PERSON_GRAPH, person_connector(), settings);

    let report = builder.build().await.unwrap();

    let path = output_dir.path().join("out").join("people-1.0.duckdb");
    assert_eq!(report.database_file.as_deref(), Some(path.as_path()));
    assert_eq!(report.entity("Person").unwrap().status, EntityStatus::Succeeded);

    let conn = open(&path);
    let count: i64 = conn
        .query_row(r#"SELECT count(*) FROM "nodes"."Person""#, [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 3);

    let age: i32 = conn
        .query_row(
            r#"SELECT "age" FROM "nodes"."Person" WHERE "id" = 7"#,
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(age, 0);

    let relationship_tables: i64 = conn
        .query_row(
            "SELECT count(*) FROM information_schema.tables WHERE table_schema = 'relationships'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(relationship_tables, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_build_replaces_an_existing_file() {
    init_test_tracing();

    let output_dir = tempfile::tempdir().unwrap();
    let mut settings = test_settings();
    settings.output_dir = output_dir.path().to_path_buf();
    let builder = builder_with(PERSON_GRAPH, person_connector(), settings);
    std::fs::write(builder.artifact_path(), b"not a database").unwrap();

    builder.build().await.unwrap();

    let conn = open(&builder.artifact_path());
    let count: i64 = conn
        .query_row(r#"SELECT count(*) FROM "nodes"."Person""#, [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_storage_appends_every_canonical_type() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("types.duckdb");
    let storage = DuckDbStorage::create(&path, 2).await.unwrap();
    assert_eq!(DuckDbStorage::name(), "duckdb");

    let schema = CanonicalSchema::new(vec![
        CanonicalField::new("i8", CanonicalType::Int8),
        CanonicalField::new("u64", CanonicalType::UInt64),
        CanonicalField::new("f16", CanonicalType::Float16),
        CanonicalField::new("f64", CanonicalType::Float64),
        CanonicalField::new("name", CanonicalType::FixedString(8)),
        CanonicalField::new("flag", CanonicalType::Bool),
        CanonicalField::new("at", CanonicalType::Time64),
    ]);
    let table = storage
        .create_table(NODES_GROUP, "Everything", &schema)
        .await
        .unwrap();

    let records = vec![
        TableRecord::with_defaults(&schema),
        TableRecord::new(vec![
            FieldValue::I8(-3),
            FieldValue::U64(u64::MAX),
            FieldValue::F16(1.5),
            FieldValue::F64(2.25),
            FieldValue::String("node".to_string()),
            FieldValue::Bool(true),
            FieldValue::Time64(1_700_000_000_000_000),
        ]),
    ];
    storage.append_records(&table, records).await.unwrap();
    assert_eq!(storage.row_count(&table).await.unwrap(), 2);

    let err = storage
        .create_table(NODES_GROUP, "Everything", &schema)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TableCreationFailed);

    storage.close().await.unwrap();
    let err = storage.close().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DestinationClosed);
    let err = storage.row_count(&table).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DestinationClosed);
    drop(storage);

    let conn = open(&path);
    let name: String = conn
        .query_row(
            r#"SELECT "name" FROM "nodes"."Everything" WHERE "flag""#,
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(name, "node");
}
