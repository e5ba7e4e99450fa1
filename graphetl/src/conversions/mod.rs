//! Conversion of source values into node table values.
//!
//! [`coerce_value`] applies the per-field policy: direct assignment first, then a retry with the
//! value transliterated to ASCII bytes when the first attempt failed on a type or encoding
//! mismatch. Nulls keep the column default.

mod ascii;
mod assign;
mod coerce;

pub use ascii::*;
pub use assign::*;
pub use coerce::*;
