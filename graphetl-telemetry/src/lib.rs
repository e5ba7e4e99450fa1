//! Telemetry setup shared by graphetl binaries and tests.
//!
//! Only logging is configured here; metric names live next to the code that records them.

pub mod tracing;
