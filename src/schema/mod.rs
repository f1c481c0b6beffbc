//! Schema module - Configuration, organism and result types.

mod evolution;
mod organism;

pub use evolution::*;
pub use organism::*;
