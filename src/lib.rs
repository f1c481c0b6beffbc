//! Markup Evolution - Genetic search over interactive markup fragments.
//!
//! This crate evolves small HTML fragments toward interactive, game-like
//! mini-applications. Each organism is a markup string; a population is
//! mutated, recombined and scored over discrete generations, and the best
//! organism found is returned.
//!
//! # Architecture
//!
//! The crate is split into three modules:
//!
//! - `markup`: Lenient fragment parser and arena document tree
//! - `schema`: Configuration, organism and result types
//! - `evolution`: Operators, fitness, selection, pattern stores and the
//!   generational controller
//!
//! # Example
//!
//! ```rust,no_run
//! use markup_evolution::{EvolutionConfig, EvolutionEngine};
//!
//! let config = EvolutionConfig {
//!     population_size: 20,
//!     max_generations: 10,
//!     random_seed: Some(7),
//!     ..Default::default()
//! };
//!
//! let engine = EvolutionEngine::with_defaults(config).unwrap();
//! let outcome = engine.evolve(r#"<div class="container"><p>hi</p></div>"#).unwrap();
//!
//! println!("Best fitness: {:.3}", outcome.best.fitness.total);
//! println!("{}", outcome.best.markup);
//! ```

pub mod evolution;
pub mod markup;
pub mod schema;

// Re-export commonly used types
pub use evolution::{EvolutionEngine, EvolutionError, PatternStore};
pub use markup::Document;
pub use schema::{EvolutionConfig, EvolutionOutcome, Organism};
