//! Streaming of source rows into node tables.
//!
//! [`record::RecordBuilder`] turns one source row into one destination record,
//! [`engine::ingest_source`] drives one bound source to completion and
//! [`pool::IngestionPool`] runs those jobs on a bounded number of workers.

pub mod engine;
pub mod pool;
pub mod record;
