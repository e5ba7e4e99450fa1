//! Metric names and labels recorded during a build.
//!
//! Values go through the [`metrics`] facade; installing an exporter is left to the binary.

/// Label for the node type label.
pub const ENTITY_LABEL: &str = "entity";

/// Label for the configured source name.
pub const SOURCE_LABEL: &str = "source";

/// Label for the error kind.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Counter of records appended to node tables.
pub const GRAPHETL_ROWS_APPENDED_TOTAL: &str = "graphetl_rows_appended_total";

/// Counter of source rows discarded because a field could not be coerced.
pub const GRAPHETL_ROWS_DISCARDED_TOTAL: &str = "graphetl_rows_discarded_total";

/// Counter of field values stored through the ASCII transliteration fallback.
pub const GRAPHETL_VALUES_COERCED_TOTAL: &str = "graphetl_values_coerced_total";

/// Counter of sources dropped or interrupted, labeled by error kind.
pub const GRAPHETL_SOURCE_FAILURES_TOTAL: &str = "graphetl_source_failures_total";

/// Histogram of batch append durations in seconds.
pub const GRAPHETL_BATCH_WRITE_DURATION_SECONDS: &str = "graphetl_batch_write_duration_seconds";

/// Histogram of per-source ingestion durations in seconds.
pub const GRAPHETL_SOURCE_INGESTION_DURATION_SECONDS: &str =
    "graphetl_source_ingestion_duration_seconds";
