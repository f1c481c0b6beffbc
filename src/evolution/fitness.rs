//! Fitness evaluation.
//!
//! The built-in evaluator scores markup on structural signals only: it
//! counts interaction hooks, control signals, game roles, animations,
//! layout containers and inline styling, then normalizes each count against
//! a configurable target.

use std::collections::BTreeSet;

use crate::markup::Document;
use crate::schema::{FitnessConfig, FitnessScores, FitnessTargets, Organism, PerformanceBudget};

use super::crossover::is_interaction_attr;
use super::mutation::editable_elements;

/// Tags that are interactive without any extra attribute.
const INTERACTIVE_TAGS: &[&str] = &["button", "input", "select", "textarea", "a", "details"];

/// Class tokens that mark game objects in hand-written fragments.
const GAME_CLASSES: &[&str] = &["player", "score", "enemy", "goal", "coin", "obstacle", "level"];

/// Errors from a fitness evaluator. Always recovered by the controller.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("evaluation failed: {0}")]
    Failed(String),
    #[error("evaluator panicked: {0}")]
    Panicked(String),
}

/// Scores an organism.
///
/// Implementations must be deterministic for identical markup and lineage,
/// and safe to call from many threads at once.
pub trait FitnessEvaluator: Send + Sync {
    fn evaluate(&self, organism: &Organism) -> Result<FitnessScores, EvaluationError>;
}

/// Raw structural counts extracted from one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkupSignals {
    pub elements: usize,
    pub max_depth: usize,
    pub interactive: usize,
    pub control: usize,
    pub game: usize,
    pub animated: usize,
    pub containers: usize,
    pub style_properties: usize,
    pub inline_style_bytes: usize,
}

impl MarkupSignals {
    /// Parse and count; `None` for unparseable markup.
    pub fn from_markup(markup: &str) -> Option<Self> {
        Document::parse(markup).ok().map(|doc| Self::from_document(&doc))
    }

    pub fn from_document(doc: &Document) -> Self {
        let mut signals = Self {
            max_depth: doc.max_depth(),
            ..Self::default()
        };
        let mut properties = BTreeSet::new();

        for id in editable_elements(doc) {
            let Some(tag) = doc.tag(id) else {
                continue;
            };
            let attrs = doc.attributes(id);
            signals.elements += 1;

            if INTERACTIVE_TAGS.contains(&tag) || attrs.iter().any(|a| is_interaction_attr(&a.name))
            {
                signals.interactive += 1;
            }

            if doc.attr(id, "data-evolve-role") == Some("player") {
                signals.control += 1;
            }
            if attrs
                .iter()
                .any(|a| a.name.starts_with("onkey") || a.name == "data-evolve-on-key")
            {
                signals.control += 1;
            }
            if doc.attr(id, "draggable") == Some("true") || doc.has_attr(id, "data-evolve-on-drag") {
                signals.control += 1;
            }

            let game_class = doc
                .attr(id, "class")
                .is_some_and(|c| c.split_whitespace().any(|t| GAME_CLASSES.contains(&t)));
            if doc.has_attr(id, "data-evolve-role") || game_class {
                signals.game += 1;
            }

            if !doc.element_children(id).is_empty() {
                signals.containers += 1;
            }

            if let Some(style) = doc.attr(id, "style") {
                signals.inline_style_bytes += style.len();
            }
            let declarations = doc.style_declarations(id);
            if declarations
                .iter()
                .any(|(name, _)| name == "animation" || name == "transition")
            {
                signals.animated += 1;
            }
            properties.extend(declarations.into_iter().map(|(name, _)| name));
        }

        signals.style_properties = properties.len();
        signals
    }

    /// Layout containers plus a nesting bonus of up to two levels.
    pub fn structure(&self) -> usize {
        self.containers + self.max_depth.saturating_sub(1).min(2)
    }

    /// `1` minus relative overshoot of each budget, floored at `0`.
    pub fn performance(&self, budget: &PerformanceBudget) -> f32 {
        let overshoot = |value: usize, limit: usize| {
            value.saturating_sub(limit) as f32 / limit.max(1) as f32
        };
        let penalty = overshoot(self.elements, budget.max_elements)
            + overshoot(self.animated, budget.max_animated_elements)
            + overshoot(self.inline_style_bytes, budget.max_inline_style_bytes);
        (1.0 - penalty).max(0.0)
    }
}

fn saturate(count: usize, target: usize) -> f32 {
    (count as f32 / target.max(1) as f32).min(1.0)
}

/// Deterministic structural evaluator.
#[derive(Debug, Clone, Default)]
pub struct MarkupFitnessEvaluator {
    config: FitnessConfig,
}

impl MarkupFitnessEvaluator {
    pub fn new(config: FitnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FitnessConfig {
        &self.config
    }

    /// Score raw signals plus lineage size.
    pub fn score(&self, signals: &MarkupSignals, applied_patterns: usize) -> FitnessScores {
        let t: &FitnessTargets = &self.config.targets;
        let metrics = [
            saturate(signals.interactive, t.interactive_elements),
            saturate(signals.control, t.control_signals),
            saturate(signals.game, t.game_elements),
            saturate(signals.animated, t.animated_elements),
            saturate(signals.structure(), t.structure_signals),
            saturate(signals.style_properties, t.style_properties),
            signals.performance(&self.config.budget),
            saturate(applied_patterns, t.applied_patterns),
        ];
        FitnessScores::from_metrics(metrics, &self.config.weights)
    }
}

impl FitnessEvaluator for MarkupFitnessEvaluator {
    fn evaluate(&self, organism: &Organism) -> Result<FitnessScores, EvaluationError> {
        let Some(signals) = MarkupSignals::from_markup(&organism.markup) else {
            log::debug!("organism {} has unparseable markup, scoring zero", organism.id);
            return Ok(FitnessScores::zero());
        };
        Ok(self.score(&signals, organism.applied_patterns.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::behavior::ensure_behavior;
    use proptest::prelude::*;

    const ARENA: &str = r##"<div class="arena" style="display: grid; gap: 4px; padding: 8px; background: #102030; color: #fafafa; border-radius: 6px; font-family: monospace; margin: 0 auto"><div class="row" style="display: flex"><div data-evolve-role="player" tabindex="0" onkeydown="move(event)" draggable="true" style="animation: evolve-pulse 1s infinite"></div><span data-evolve-role="score">0</span></div><div data-evolve-role="collectible" data-evolve-on-click="collect" style="animation: evolve-spin 2s infinite"></div><div data-evolve-role="goal" data-evolve-on-hover="highlight" style="transition: transform 0.2s"></div><button data-evolve-on-click="score">Go</button><button onclick="reset()">Reset</button></div>"##;

    fn evaluate(markup: &str) -> FitnessScores {
        MarkupFitnessEvaluator::default()
            .evaluate(&Organism::new(0, markup))
            .unwrap()
    }

    #[test]
    fn test_plain_seed_scores_low() {
        let scores = evaluate(r#"<div class="container"><p>hi</p></div>"#);
        assert_eq!(scores.interactivity, 0.0);
        assert_eq!(scores.game_elements, 0.0);
        assert_eq!(scores.performance, 1.0);
        assert!(scores.total < 0.2, "total {}", scores.total);
    }

    #[test]
    fn test_rich_arena_scores_high() {
        let scores = evaluate(ARENA);
        assert_eq!(scores.interactivity, 1.0);
        assert_eq!(scores.player_control, 1.0);
        assert_eq!(scores.game_elements, 1.0);
        assert_eq!(scores.animation, 1.0);
        assert_eq!(scores.structure, 1.0);
        assert_eq!(scores.aesthetics, 1.0);
        assert_eq!(scores.novelty, 0.0);
        assert!((scores.total - 0.95).abs() < 1e-4, "total {}", scores.total);
    }

    #[test]
    fn test_runtime_block_does_not_change_score() {
        assert_eq!(evaluate(ARENA), evaluate(&ensure_behavior(ARENA)));
    }

    #[test]
    fn test_unparseable_markup_scores_zero() {
        assert_eq!(evaluate("<div class=\"open>"), FitnessScores::zero());
    }

    #[test]
    fn test_novelty_follows_lineage() {
        let mut organism = Organism::new(0, "<p>x</p>");
        organism.applied_patterns = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let scores = MarkupFitnessEvaluator::default().evaluate(&organism).unwrap();
        assert!((scores.novelty - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_performance_penalties() {
        let budget = PerformanceBudget::default();
        let signals = MarkupSignals {
            elements: 180,
            ..MarkupSignals::default()
        };
        assert!((signals.performance(&budget) - 0.5).abs() < 1e-6);

        let signals = MarkupSignals {
            elements: 1000,
            animated: 100,
            ..MarkupSignals::default()
        };
        assert_eq!(signals.performance(&budget), 0.0);
    }

    #[test]
    fn test_identical_markup_evaluates_identically() {
        let evaluator = MarkupFitnessEvaluator::default();
        let a = evaluator.evaluate(&Organism::new(1, ARENA)).unwrap();
        let b = evaluator.evaluate(&Organism::new(2, ARENA)).unwrap();
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn prop_scores_are_bounded(
            markup in r#"(<(div|button|span) (style="animation: x; color: red"|onclick="f()"|data-evolve-role="player"|class="score")?>){0,12}[a-z ]{0,8}"#,
            lineage in 0usize..12,
        ) {
            let mut organism = Organism::new(0, markup);
            organism.applied_patterns = (0..lineage).map(|i| i.to_string()).collect();
            let scores = MarkupFitnessEvaluator::default().evaluate(&organism).unwrap();
            for metric in scores.metrics().into_iter().chain([scores.total]) {
                prop_assert!((0.0..=1.0).contains(&metric));
            }
        }
    }
}
