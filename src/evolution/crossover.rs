//! Built-in crossover operators.
//!
//! Every operator picks one candidate node in each parent and exchanges some
//! part of it. Candidate pairs are tried in random order until the exchange
//! gives two children that differ from both parents. When either parent is
//! unparseable, has no candidate node, or no pair exchanges anything new,
//! both parents come back unchanged.

use rand::RngCore;
use rand::seq::SliceRandom;

use crate::markup::{Attribute, Document, MarkupError, NodeId};

use super::mutation::editable_elements;
use super::registry::{CrossoverOperator, Operator, OperatorError};

/// Default set of crossover operators with their default weights.
pub fn default_crossovers() -> Vec<Box<dyn CrossoverOperator>> {
    vec![
        Box::new(SinglePointCrossover::default()),
        Box::new(AttributeCrossover::default()),
        Box::new(SubtreeCrossover::default()),
        Box::new(InteractionCrossover::default()),
    ]
}

fn unchanged(first: &str, second: &str) -> Result<(String, String), OperatorError> {
    Ok((first.to_string(), second.to_string()))
}

/// Upper bound on candidate pairs tried per crossover.
const MAX_EXCHANGE_ATTEMPTS: usize = 64;

/// Parse both parents and apply `swap` to candidate pairs in random order,
/// keeping the first result where neither child equals either parent.
fn exchange(
    first: &str,
    second: &str,
    candidates: fn(&Document) -> Vec<NodeId>,
    rng: &mut dyn RngCore,
    swap: impl Fn(&mut Document, NodeId, &mut Document, NodeId) -> Result<(), MarkupError>,
) -> Result<(String, String), OperatorError> {
    let (Ok(a), Ok(b)) = (Document::parse(first), Document::parse(second)) else {
        return unchanged(first, second);
    };
    let parents = [a.to_html(), b.to_html()];

    let in_b = candidates(&b);
    let mut pairs: Vec<(NodeId, NodeId)> = candidates(&a)
        .into_iter()
        .flat_map(|na| in_b.iter().map(move |&nb| (na, nb)))
        .collect();
    pairs.shuffle(rng);

    for (na, nb) in pairs.into_iter().take(MAX_EXCHANGE_ATTEMPTS) {
        let (mut ca, mut cb) = (a.clone(), b.clone());
        swap(&mut ca, na, &mut cb, nb)?;
        let children = (ca.to_html(), cb.to_html());
        if !parents.contains(&children.0) && !parents.contains(&children.1) {
            return Ok(children);
        }
    }
    unchanged(first, second)
}

fn with_children(doc: &Document) -> Vec<NodeId> {
    editable_elements(doc)
        .into_iter()
        .filter(|&id| !doc.children(id).is_empty())
        .collect()
}

fn with_element_children(doc: &Document) -> Vec<NodeId> {
    editable_elements(doc)
        .into_iter()
        .filter(|&id| !doc.element_children(id).is_empty())
        .collect()
}

/// Copy the attributes selected by `matches` from `source` onto `node`,
/// dropping whatever `node` had under those names.
fn transfer_attributes(
    source: &[Attribute],
    target: &mut Document,
    node: NodeId,
    matches: fn(&str) -> bool,
) {
    let stale: Vec<String> = target
        .attributes(node)
        .iter()
        .filter(|a| matches(&a.name))
        .map(|a| a.name.clone())
        .collect();
    for name in stale {
        target.remove_attr(node, &name);
    }
    for attr in source.iter().filter(|a| matches(&a.name)) {
        target.set_attr(node, &attr.name, attr.value.clone().unwrap_or_default());
    }
}

fn swap_attributes(
    a: &mut Document,
    na: NodeId,
    b: &mut Document,
    nb: NodeId,
    matches: fn(&str) -> bool,
) {
    let from_a = a.attributes(na).to_vec();
    let from_b = b.attributes(nb).to_vec();
    transfer_attributes(&from_b, a, na, matches);
    transfer_attributes(&from_a, b, nb, matches);
}

// ============================================================================
// single-point
// ============================================================================

/// Swaps the inner content of one node per parent.
#[derive(Debug, Clone)]
pub struct SinglePointCrossover {
    pub weight: f32,
}

impl Default for SinglePointCrossover {
    fn default() -> Self {
        Self { weight: 1.0 }
    }
}

impl Operator for SinglePointCrossover {
    fn name(&self) -> &str {
        "single-point"
    }

    fn weight(&self) -> f32 {
        self.weight
    }
}

impl CrossoverOperator for SinglePointCrossover {
    fn apply(
        &self,
        first: &str,
        second: &str,
        rng: &mut dyn RngCore,
    ) -> Result<(String, String), OperatorError> {
        exchange(first, second, with_children, rng, |a, na, b, nb| {
            let inner_a = a.inner_html(na);
            let inner_b = b.inner_html(nb);
            a.set_inner_html(na, &inner_b)?;
            b.set_inner_html(nb, &inner_a)
        })
    }
}

// ============================================================================
// attribute
// ============================================================================

fn is_presentation_attr(name: &str) -> bool {
    name == "style" || name == "class"
}

fn with_presentation(doc: &Document) -> Vec<NodeId> {
    editable_elements(doc)
        .into_iter()
        .filter(|&id| doc.attributes(id).iter().any(|a| is_presentation_attr(&a.name)))
        .collect()
}

/// Swaps `style` and `class` between one element per parent.
#[derive(Debug, Clone)]
pub struct AttributeCrossover {
    pub weight: f32,
}

impl Default for AttributeCrossover {
    fn default() -> Self {
        Self { weight: 1.0 }
    }
}

impl Operator for AttributeCrossover {
    fn name(&self) -> &str {
        "attribute"
    }

    fn weight(&self) -> f32 {
        self.weight
    }
}

impl CrossoverOperator for AttributeCrossover {
    fn apply(
        &self,
        first: &str,
        second: &str,
        rng: &mut dyn RngCore,
    ) -> Result<(String, String), OperatorError> {
        exchange(first, second, with_presentation, rng, |a, na, b, nb| {
            swap_attributes(a, na, b, nb, is_presentation_attr);
            Ok(())
        })
    }
}

// ============================================================================
// subtree
// ============================================================================

/// Swaps one whole element that has element children.
#[derive(Debug, Clone)]
pub struct SubtreeCrossover {
    pub weight: f32,
}

impl Default for SubtreeCrossover {
    fn default() -> Self {
        Self { weight: 1.0 }
    }
}

impl Operator for SubtreeCrossover {
    fn name(&self) -> &str {
        "subtree"
    }

    fn weight(&self) -> f32 {
        self.weight
    }
}

impl CrossoverOperator for SubtreeCrossover {
    fn apply(
        &self,
        first: &str,
        second: &str,
        rng: &mut dyn RngCore,
    ) -> Result<(String, String), OperatorError> {
        exchange(first, second, with_element_children, rng, |a, na, b, nb| {
            let outer_a = a.outer_html(na);
            let outer_b = b.outer_html(nb);
            a.replace_with_html(na, &outer_b)?;
            b.replace_with_html(nb, &outer_a)
        })
    }
}

// ============================================================================
// interaction
// ============================================================================

/// Event handlers, `data-evolve-on-*` triggers and focus/drag flags.
pub fn is_interaction_attr(name: &str) -> bool {
    (name.len() > 2 && name.starts_with("on"))
        || name.starts_with("data-evolve-on-")
        || name == "draggable"
        || name == "tabindex"
}

fn with_interactions(doc: &Document) -> Vec<NodeId> {
    editable_elements(doc)
        .into_iter()
        .filter(|&id| doc.attributes(id).iter().any(|a| is_interaction_attr(&a.name)))
        .collect()
}

/// Swaps the interaction attributes of one interactive element per parent.
#[derive(Debug, Clone)]
pub struct InteractionCrossover {
    pub weight: f32,
}

impl Default for InteractionCrossover {
    fn default() -> Self {
        Self { weight: 1.0 }
    }
}

impl Operator for InteractionCrossover {
    fn name(&self) -> &str {
        "interaction"
    }

    fn weight(&self) -> f32 {
        self.weight
    }
}

impl CrossoverOperator for InteractionCrossover {
    fn apply(
        &self,
        first: &str,
        second: &str,
        rng: &mut dyn RngCore,
    ) -> Result<(String, String), OperatorError> {
        exchange(first, second, with_interactions, rng, |a, na, b, nb| {
            swap_attributes(a, na, b, nb, is_interaction_attr);
            Ok(())
        })
    }
}
