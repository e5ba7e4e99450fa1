mod graph;
mod settings;
mod validation;

pub use graph::*;
pub use settings::*;
pub use validation::*;
