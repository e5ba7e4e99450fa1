//! MySQL connection utilities.
//!
//! Resolves connection parameters from the graph document and MySQL option files, connects
//! through [`sqlx`], and names column types the way the MySQL wire protocol does.

pub mod connection;
pub mod option_file;
pub mod types;
