//! Evolutionary search over interactive markup fragments.
//!
//! # Overview
//!
//! - **Operators** (`registry`, `mutation`, `crossover`): named, weighted
//!   transforms picked by roulette selection
//! - **Fitness** (`fitness`): pluggable evaluators; the built-in one scores
//!   structural signals
//! - **Selection** (`selection`): tournament selection with replacement
//! - **Runtime behavior** (`behavior`): the shared script block that gives
//!   `data-evolve-*` markers their meaning
//! - **Pattern stores** (`store`): similar-pattern seeding and persistence
//! - **Search** (`search`): the generational controller
//!
//! # Example
//!
//! ```rust,no_run
//! use markup_evolution::evolution::EvolutionEngine;
//! use markup_evolution::schema::EvolutionConfig;
//!
//! let engine = EvolutionEngine::with_defaults(EvolutionConfig::default()).unwrap();
//! let outcome = engine
//!     .evolve_with_callback(r#"<div class="container"><p>hi</p></div>"#, |progress| {
//!         println!(
//!             "Generation {}: best fitness = {:.3}",
//!             progress.generation, progress.best_fitness
//!         );
//!     })
//!     .unwrap();
//!
//! println!("{}", outcome.best.markup);
//! ```

mod behavior;
mod crossover;
mod fitness;
mod mutation;
mod registry;
mod rng;
mod search;
mod selection;
mod store;

pub use behavior::{RUNTIME_MARKER, ensure_behavior, has_behavior};
pub use crossover::{
    AttributeCrossover, InteractionCrossover, SinglePointCrossover, SubtreeCrossover,
    default_crossovers, is_interaction_attr,
};
pub use fitness::{EvaluationError, FitnessEvaluator, MarkupFitnessEvaluator, MarkupSignals};
pub use mutation::{
    AddAnimation, AddGameElement, AddInteraction, ChangeLayout, KEYFRAMES_MARKER, ModifyStyle,
    default_mutations,
};
pub use registry::{
    CrossoverOperator, CrossoverOutcome, MutationOperator, MutationOutcome, Operator,
    OperatorError, OperatorRegistry,
};
pub use rng::EvolutionRng;
pub use search::{EvolutionEngine, EvolutionError};
pub use selection::TournamentSelection;
pub use store::{
    EMBEDDING_DIM, InMemoryPatternStore, JsonDirPatternStore, PatternStore, SimilarPattern,
    SimilarityQuery, StoreError, StoredPattern, auto_tags, cosine_similarity, pattern_id,
    structural_embedding,
};
