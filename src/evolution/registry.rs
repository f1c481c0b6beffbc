//! Operator traits and weighted operator registries.
//!
//! Operators are named, weighted, stateless transforms stored in insertion
//! order. Selection is a cumulative-weight roulette over a uniform draw in
//! `[0, total_weight)`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use rand::{Rng, RngCore};

use crate::markup::MarkupError;
use crate::schema::ConfigError;

/// Capabilities shared by every operator.
pub trait Operator: Send + Sync {
    /// Unique name within a registry.
    fn name(&self) -> &str;
    /// Relative selection weight; must be positive.
    fn weight(&self) -> f32;
}

/// One markup in, one markup out.
pub trait MutationOperator: Operator {
    fn apply(&self, markup: &str, rng: &mut dyn RngCore) -> Result<String, OperatorError>;
}

/// Two markups in, two markups out.
pub trait CrossoverOperator: Operator {
    fn apply(
        &self,
        first: &str,
        second: &str,
        rng: &mut dyn RngCore,
    ) -> Result<(String, String), OperatorError>;
}

/// Failure inside an operator call. Always recovered by the caller.
#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    #[error("{0}")]
    Failed(String),
    #[error("markup error: {0}")]
    Markup(#[from] MarkupError),
    #[error("panicked: {0}")]
    Panicked(String),
}

/// Ordered collection of operators with weighted random selection.
pub struct OperatorRegistry<O: ?Sized> {
    operators: Vec<Box<O>>,
    total_weight: f32,
}

impl<O: Operator + ?Sized> Default for OperatorRegistry<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Operator + ?Sized> OperatorRegistry<O> {
    pub fn new() -> Self {
        Self {
            operators: Vec::new(),
            total_weight: 0.0,
        }
    }

    /// Register an operator. Names must be unique and weights positive.
    pub fn register(&mut self, operator: Box<O>) -> Result<(), ConfigError> {
        let weight = operator.weight();
        if !(weight.is_finite() && weight > 0.0) {
            return Err(ConfigError::InvalidOperatorWeight {
                name: operator.name().to_string(),
                weight,
            });
        }
        if self.get(operator.name()).is_some() {
            return Err(ConfigError::DuplicateOperator(operator.name().to_string()));
        }
        self.total_weight += weight;
        self.operators.push(operator);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn total_weight(&self) -> f32 {
        self.total_weight
    }

    pub fn names(&self) -> Vec<&str> {
        self.operators.iter().map(|op| op.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&O> {
        self.operators
            .iter()
            .find(|op| op.name() == name)
            .map(|op| &**op)
    }

    /// Weighted random pick; `None` only when the registry is empty.
    pub fn choose(&self, rng: &mut dyn RngCore) -> Option<&O> {
        let weights = self.operators.iter().map(|op| op.weight());
        let index = roulette(weights, self.total_weight, rng)?;
        Some(&*self.operators[index])
    }

    /// Every operator once, in weighted random order: each position is a
    /// roulette draw over the operators not yet placed.
    pub fn weighted_order(&self, rng: &mut dyn RngCore) -> Vec<&O> {
        let mut remaining: Vec<&O> = self.operators.iter().map(|op| &**op).collect();
        let mut order = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let total = remaining.iter().map(|op| op.weight()).sum();
            let Some(index) = roulette(remaining.iter().map(|op| op.weight()), total, rng) else {
                break;
            };
            order.push(remaining.remove(index));
        }
        order
    }
}

/// Cumulative-weight roulette over a uniform draw in `[0, total)`.
fn roulette(
    weights: impl ExactSizeIterator<Item = f32>,
    total: f32,
    rng: &mut dyn RngCore,
) -> Option<usize> {
    let len = weights.len();
    if len == 0 {
        return None;
    }
    let target = rng.r#gen::<f32>() * total;
    let mut cumulative = 0.0;
    for (i, weight) in weights.enumerate() {
        cumulative += weight;
        if target < cumulative {
            return Some(i);
        }
    }
    // Float rounding can leave target just past the last boundary.
    Some(len - 1)
}

/// Result of the mutation protocol.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub markup: String,
    /// Operators that ran successfully, in order.
    pub applied: Vec<String>,
    /// Operator calls that failed and were skipped.
    pub failures: u64,
}

impl OperatorRegistry<dyn MutationOperator> {
    /// Apply one operator unconditionally, then keep applying operators to
    /// the result while a fresh draw is below `rate`, up to `max_chain`
    /// applications in total.
    ///
    /// A failing operator leaves the markup as it was before that call.
    pub fn mutate(
        &self,
        markup: &str,
        rate: f32,
        max_chain: usize,
        rng: &mut dyn RngCore,
    ) -> MutationOutcome {
        let mut outcome = MutationOutcome {
            markup: markup.to_string(),
            applied: Vec::new(),
            failures: 0,
        };

        let mut attempts = 0;
        while attempts < max_chain {
            let Some(op) = self.choose(rng) else {
                break;
            };
            attempts += 1;

            let current = &outcome.markup;
            match catch_panic(|| op.apply(current, rng)) {
                Ok(Ok(next)) => {
                    outcome.markup = next;
                    outcome.applied.push(op.name().to_string());
                }
                Ok(Err(err)) => {
                    log::warn!("mutation '{}' failed, keeping input: {err}", op.name());
                    outcome.failures += 1;
                }
                Err(panic) => {
                    log::warn!("mutation '{}' panicked, keeping input: {panic}", op.name());
                    outcome.failures += 1;
                }
            }

            if rng.r#gen::<f32>() >= rate {
                break;
            }
        }

        outcome
    }
}

/// Result of one crossover event.
#[derive(Debug, Clone)]
pub struct CrossoverOutcome {
    pub first: String,
    pub second: String,
    /// Operator whose exchange changed at least one parent.
    pub operator: Option<String>,
    pub failed: bool,
}

impl OperatorRegistry<dyn CrossoverOperator> {
    /// Apply one weighted-random crossover operator.
    ///
    /// An operator that finds nothing to exchange returns its parents as
    /// they were; the next operator in weighted order is tried instead, so
    /// the result comes from exactly one effective exchange. When no
    /// operator changes anything, or one fails, both parents are returned
    /// unchanged and `operator` is `None`.
    pub fn recombine(&self, first: &str, second: &str, rng: &mut dyn RngCore) -> CrossoverOutcome {
        let unchanged = |failed| CrossoverOutcome {
            first: first.to_string(),
            second: second.to_string(),
            operator: None,
            failed,
        };

        for op in self.weighted_order(rng) {
            match catch_panic(|| op.apply(first, second, rng)) {
                Ok(Ok((a, b))) => {
                    if a != first || b != second {
                        return CrossoverOutcome {
                            first: a,
                            second: b,
                            operator: Some(op.name().to_string()),
                            failed: false,
                        };
                    }
                }
                Ok(Err(err)) => {
                    log::warn!("crossover '{}' failed, keeping parents: {err}", op.name());
                    return unchanged(true);
                }
                Err(panic) => {
                    log::warn!("crossover '{}' panicked, keeping parents: {panic}", op.name());
                    return unchanged(true);
                }
            }
        }
        unchanged(false)
    }
}

/// Run `f`, turning a panic into its message.
pub(crate) fn catch_panic<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
