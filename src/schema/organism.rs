//! Organisms, fitness scores and run results.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::FitnessWeights;

/// One candidate fragment plus its fitness and lineage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organism {
    /// Unique identifier within a run.
    pub id: u64,
    /// The fragment itself.
    pub markup: String,
    /// Generation the organism was created in. Elites keep theirs.
    pub generation: usize,
    /// Scores from the last evaluation.
    pub fitness: FitnessScores,
    /// Zero, one or two parents.
    pub parent_ids: Vec<u64>,
    /// Names of every operator applied along the lineage.
    pub applied_patterns: BTreeSet<String>,
}

impl Organism {
    /// A generation-0 organism with no lineage and zero fitness.
    pub fn new(id: u64, markup: impl Into<String>) -> Self {
        Self {
            id,
            markup: markup.into(),
            generation: 0,
            fitness: FitnessScores::default(),
            parent_ids: Vec::new(),
            applied_patterns: BTreeSet::new(),
        }
    }
}

/// Normalized sub-metrics, each in `[0, 1]`, plus their weighted mean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessScores {
    pub interactivity: f32,
    pub player_control: f32,
    pub game_elements: f32,
    pub animation: f32,
    pub structure: f32,
    pub aesthetics: f32,
    pub performance: f32,
    pub novelty: f32,
    pub total: f32,
}

impl FitnessScores {
    /// Sub-metric names in [`FitnessScores::metrics`] order.
    pub const METRIC_NAMES: [&'static str; 8] = [
        "interactivity",
        "player_control",
        "game_elements",
        "animation",
        "structure",
        "aesthetics",
        "performance",
        "novelty",
    ];

    /// All-zero scores, used for malformed markup and failed evaluations.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Build scores from raw sub-metrics; values are clamped into `[0, 1]`.
    pub fn from_metrics(metrics: [f32; 8], weights: &FitnessWeights) -> Self {
        let m = metrics.map(clamp_unit);
        let w = weights.as_array();
        let total_weight: f32 = w.iter().sum();
        let total = if total_weight > 0.0 {
            m.iter().zip(&w).map(|(s, w)| s * w).sum::<f32>() / total_weight
        } else {
            0.0
        };

        Self {
            interactivity: m[0],
            player_control: m[1],
            game_elements: m[2],
            animation: m[3],
            structure: m[4],
            aesthetics: m[5],
            performance: m[6],
            novelty: m[7],
            total: clamp_unit(total),
        }
    }

    pub fn metrics(&self) -> [f32; 8] {
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

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Summary of one completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub generation: usize,
    pub best_fitness: f32,
    pub average_fitness: f32,
    /// The evaluated population as it was recorded.
    pub population_snapshot: Vec<Organism>,
}

/// Current phase of the generational loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    #[default]
    Seeding,
    Evaluating,
    Recording,
    Selecting,
    Reproducing,
    Replacing,
    /// Loop ended normally.
    Complete,
    /// Loop ended by cancellation or time budget.
    Stopped,
}

/// Progress update emitted after each recorded generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    pub generation: usize,
    pub max_generations: usize,
    /// Best total fitness seen so far.
    pub best_fitness: f32,
    /// Best total fitness in this generation.
    pub generation_best: f32,
    pub average_fitness: f32,
    pub phase: EvolutionPhase,
}

/// Reason evolution stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Recorded `max_generations` generations.
    MaxGenerations,
    /// Best fitness reached the configured threshold.
    TargetReached,
    /// Wall-clock budget spent.
    TimeBudget,
    /// Cancelled through the cancel handle.
    Cancelled,
}

/// Statistics from an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Generations recorded.
    pub generations: usize,
    pub total_evaluations: u64,
    pub best_fitness: f32,
    pub final_avg_fitness: f32,
    pub elapsed_seconds: f64,
    pub evaluations_per_second: f64,
    /// Operator and evaluator failures replaced by a fallback.
    pub recovered_failures: u64,
    pub stop_reason: StopReason,
}

/// Non-fatal problems reported alongside a successful run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EvolutionWarning {
    /// Storing the best organism failed.
    PersistenceFailed(String),
}

/// Final result of an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionOutcome {
    /// Best organism across all recorded generations.
    pub best: Organism,
    /// One record per completed generation.
    pub history: Vec<GenerationRecord>,
    pub stats: EvolutionStats,
    pub warnings: Vec<EvolutionWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_is_weighted_mean() {
        let weights = FitnessWeights::default();
        let scores = FitnessScores::from_metrics([1.0; 8], &weights);
        assert!((scores.total - 1.0).abs() < 1e-6);

        let scores = FitnessScores::from_metrics([1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], &weights);
        let expected = weights.interactivity / weights.as_array().iter().sum::<f32>();
        assert!((scores.total - expected).abs() < 1e-6);
    }

    #[test]
    fn test_metrics_are_clamped() {
        let scores = FitnessScores::from_metrics(
            [2.0, -1.0, f32::NAN, 0.5, 0.5, 0.5, 0.5, 0.5],
            &FitnessWeights::default(),
        );
        assert_eq!(scores.interactivity, 1.0);
        assert_eq!(scores.player_control, 0.0);
        assert_eq!(scores.game_elements, 0.0);
        assert!((0.0..=1.0).contains(&scores.total));
    }
}
