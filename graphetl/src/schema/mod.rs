//! Schema discovery helpers: native type resolution, schema merging and field index maps.

mod field_map;
mod harmonize;
mod type_map;

pub use field_map::*;
pub use harmonize::*;
pub use type_map::*;
