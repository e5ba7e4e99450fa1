mod core;
mod schema;

pub use self::core::*;
pub use schema::*;
