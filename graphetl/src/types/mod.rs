//! Value and schema types shared by sources, the harmonizer, ingestion and storage.
//!
//! Sources produce [`SourceRow`]s of dynamically typed [`Cell`]s described by [`SourceField`]s.
//! Node tables hold [`TableRecord`]s whose [`FieldValue`]s match a [`CanonicalSchema`].

mod canonical;
mod cell;
mod record;
mod source;

pub use canonical::*;
pub use cell::*;
pub use record::*;
pub use source::*;
