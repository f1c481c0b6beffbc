//! Evolution configuration types for markup organism search.
//!
//! Every field has a serde default so partial JSON configs are accepted.

use serde::{Deserialize, Serialize};

/// Top-level configuration for one evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Number of organisms per generation.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Number of generations to record before stopping.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Probability of mutating an offspring, and of each extra mutation in a chain.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f32,
    /// Probability that a parent pair is recombined.
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f32,
    /// Number of best organisms copied unchanged into the next generation.
    #[serde(default = "default_elitism_count")]
    pub elitism_count: usize,
    /// Organisms drawn per tournament.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Stop as soon as the best total fitness reaches this value.
    #[serde(default)]
    pub fitness_threshold: Option<f32>,
    /// Upper bound on mutation operators applied in one chain.
    #[serde(default = "default_max_mutation_chain")]
    pub max_mutation_chain: usize,
    /// Ensure the shared runtime behavior block on every organism.
    #[serde(default = "default_inject_behavior")]
    pub inject_behavior: bool,
    /// Persist the best organism to the pattern store when the run ends.
    #[serde(default = "default_persist_best")]
    pub persist_best: bool,
    /// Wall-clock budget checked between generations.
    #[serde(default)]
    pub time_budget_secs: Option<f64>,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Similar-pattern lookup at seeding time.
    #[serde(default)]
    pub seeding: SeedingConfig,
    /// Fitness weights, targets and performance budget.
    #[serde(default)]
    pub fitness: FitnessConfig,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            max_generations: default_max_generations(),
            mutation_rate: default_mutation_rate(),
            crossover_rate: default_crossover_rate(),
            elitism_count: default_elitism_count(),
            tournament_size: default_tournament_size(),
            fitness_threshold: None,
            max_mutation_chain: default_max_mutation_chain(),
            inject_behavior: default_inject_behavior(),
            persist_best: default_persist_best(),
            time_budget_secs: None,
            random_seed: None,
            seeding: SeedingConfig::default(),
            fitness: FitnessConfig::default(),
        }
    }
}

fn default_population_size() -> usize {
    50
}
fn default_max_generations() -> usize {
    20
}
fn default_mutation_rate() -> f32 {
    0.5
}
fn default_crossover_rate() -> f32 {
    0.8
}
fn default_elitism_count() -> usize {
    2
}
fn default_tournament_size() -> usize {
    3
}
fn default_max_mutation_chain() -> usize {
    5
}
fn default_inject_behavior() -> bool {
    true
}
fn default_persist_best() -> bool {
    true
}

/// Query parameters for the similar-pattern lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedingConfig {
    /// Pattern type passed to the store.
    #[serde(default = "default_pattern_type")]
    pub pattern_type: String,
    /// Minimum cosine similarity for a stored pattern to be used.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Maximum number of similar patterns requested.
    #[serde(default = "default_similar_limit")]
    pub limit: usize,
}

impl Default for SeedingConfig {
    fn default() -> Self {
        Self {
            pattern_type: default_pattern_type(),
            similarity_threshold: default_similarity_threshold(),
            limit: default_similar_limit(),
        }
    }
}

fn default_pattern_type() -> String {
    "interactive-fragment".to_string()
}
fn default_similarity_threshold() -> f32 {
    0.7
}
fn default_similar_limit() -> usize {
    5
}

/// Configuration of the built-in markup fitness evaluator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitnessConfig {
    #[serde(default)]
    pub weights: FitnessWeights,
    #[serde(default)]
    pub targets: FitnessTargets,
    #[serde(default)]
    pub budget: PerformanceBudget,
}

/// Weight of each sub-metric in the total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    pub interactivity: f32,
    pub player_control: f32,
    pub game_elements: f32,
    pub animation: f32,
    pub structure: f32,
    pub aesthetics: f32,
    pub performance: f32,
    pub novelty: f32,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            interactivity: 0.25,
            player_control: 0.20,
            game_elements: 0.15,
            animation: 0.10,
            structure: 0.10,
            aesthetics: 0.08,
            performance: 0.07,
            novelty: 0.05,
        }
    }
}

impl FitnessWeights {
    /// Weights in sub-metric order.
    pub fn as_array(&self) -> [f32; 8] {
        [
            self.interactivity,
            self.player_control,
            self.game_elements,
            self.animation,
            self.structure,
            self.aesthetics,
            self.performance,
            self.novelty,
        ]
    }
}

/// Signal count at which a sub-metric saturates at 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessTargets {
    /// Elements carrying any interaction hook.
    pub interactive_elements: usize,
    /// Player role, keyboard and drag signals.
    pub control_signals: usize,
    /// Elements with a game role.
    pub game_elements: usize,
    /// Elements with an animation or transition.
    pub animated_elements: usize,
    /// Layout containers plus nesting bonus.
    pub structure_signals: usize,
    /// Distinct inline style properties.
    pub style_properties: usize,
    /// Distinct operators in the lineage.
    pub applied_patterns: usize,
}

impl Default for FitnessTargets {
    fn default() -> Self {
        Self {
            interactive_elements: 5,
            control_signals: 3,
            game_elements: 4,
            animated_elements: 3,
            structure_signals: 3,
            style_properties: 8,
            applied_patterns: 5,
        }
    }
}

/// Thresholds above which the performance sub-metric is penalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceBudget {
    pub max_elements: usize,
    pub max_animated_elements: usize,
    pub max_inline_style_bytes: usize,
}

impl Default for PerformanceBudget {
    fn default() -> Self {
        Self {
            max_elements: 120,
            max_animated_elements: 8,
            max_inline_style_bytes: 2000,
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Configuration errors raised before a run starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 2 (got {0})")]
    PopulationTooSmall(usize),
    #[error("Elitism count {elitism} must be smaller than population size {population}")]
    ElitismTooLarge { elitism: usize, population: usize },
    #[error("{name} must be within [0, 1] (got {value})")]
    InvalidRate { name: &'static str, value: f32 },
    #[error("Tournament size must be at least 1")]
    TournamentTooSmall,
    #[error("Mutation chain limit must be at least 1")]
    InvalidMutationChain,
    #[error("Time budget must be positive (got {0})")]
    InvalidTimeBudget(f64),
    #[error("Invalid fitness weights: {0}")]
    InvalidWeights(String),
    #[error("Fitness targets must be non-zero")]
    InvalidTargets,
    #[error("No fitness evaluator registered")]
    MissingEvaluator,
    #[error("No mutation operators registered")]
    NoMutationOperators,
    #[error("No crossover operators registered")]
    NoCrossoverOperators,
    #[error("Operator '{0}' is already registered")]
    DuplicateOperator(String),
    #[error("Operator '{name}' has non-positive weight {weight}")]
    InvalidOperatorWeight { name: String, weight: f32 },
}

impl EvolutionConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(ConfigError::PopulationTooSmall(self.population_size));
        }
        if self.elitism_count >= self.population_size {
            return Err(ConfigError::ElitismTooLarge {
                elitism: self.elitism_count,
                population: self.population_size,
            });
        }

        let check_rate = |value: f32, name: &'static str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::InvalidRate { name, value })
            }
        };
        check_rate(self.mutation_rate, "mutation_rate")?;
        check_rate(self.crossover_rate, "crossover_rate")?;
        if let Some(threshold) = self.fitness_threshold {
            check_rate(threshold, "fitness_threshold")?;
        }
        check_rate(self.seeding.similarity_threshold, "similarity_threshold")?;

        if self.tournament_size == 0 {
            return Err(ConfigError::TournamentTooSmall);
        }
        if self.max_mutation_chain == 0 {
            return Err(ConfigError::InvalidMutationChain);
        }
        if let Some(budget) = self.time_budget_secs
            && budget <= 0.0
        {
            return Err(ConfigError::InvalidTimeBudget(budget));
        }

        self.fitness.validate()
    }
}

impl FitnessConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = self.weights.as_array();
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(ConfigError::InvalidWeights(format!(
                "weight {w} must be finite and non-negative"
            )));
        }
        if weights.iter().sum::<f32>() <= 0.0 {
            return Err(ConfigError::InvalidWeights(
                "at least one weight must be positive".to_string(),
            ));
        }

        let t = &self.targets;
        let targets = [
            t.interactive_elements,
            t.control_signals,
            t.game_elements,
            t.animated_elements,
            t.structure_signals,
            t.style_properties,
            t.applied_patterns,
        ];
        if targets.contains(&0) {
            return Err(ConfigError::InvalidTargets);
        }
        Ok(())
    }
}
