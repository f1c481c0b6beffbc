//! Markup module - Parsing, editing and serializing markup fragments.
//!
//! Organisms carry their markup as plain strings. Operators and the fitness
//! evaluator parse it into a [`Document`], work on the tree and serialize the
//! result back.

mod document;
mod parse;
mod style;

pub use document::*;
pub use parse::{MAX_DEPTH, MarkupError};
pub use style::{format_declarations, parse_declarations};
