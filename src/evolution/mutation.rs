//! Built-in mutation operators.
//!
//! Each operator parses the markup, changes one randomly chosen element and
//! serializes the result. Unparseable input, or input with nothing to act
//! on, is returned unchanged.

use rand::RngCore;
use rand::prelude::*;

use crate::markup::{Attribute, Document, NodeId, ROOT, is_raw_text, is_void};

use super::registry::{MutationOperator, Operator, OperatorError};

/// Attribute that marks the shared keyframes block.
pub const KEYFRAMES_MARKER: &str = "data-evolve-keyframes";

/// Elements operators may edit: everything but raw text blocks.
pub(crate) fn editable_elements(doc: &Document) -> Vec<NodeId> {
    doc.elements()
        .into_iter()
        .filter(|&id| doc.tag(id).is_some_and(|tag| !is_raw_text(tag)))
        .collect()
}

/// Editable elements that can hold children.
pub(crate) fn container_elements(doc: &Document) -> Vec<NodeId> {
    editable_elements(doc)
        .into_iter()
        .filter(|&id| doc.tag(id).is_some_and(|tag| !is_void(tag)))
        .collect()
}

fn pick(candidates: &[NodeId], rng: &mut dyn RngCore) -> Option<NodeId> {
    candidates.choose(rng).copied()
}

/// Gaussian step of `strength` times the bound width, clamped to bounds.
fn gaussian_step(rng: &mut dyn RngCore, value: f32, strength: f32, bounds: (f32, f32)) -> f32 {
    let noise: f32 = rng.sample(rand_distr::StandardNormal);
    (value + noise * strength * (bounds.1 - bounds.0)).clamp(bounds.0, bounds.1)
}

fn random_color(rng: &mut dyn RngCore) -> String {
    format!("#{:06x}", rng.gen_range(0..0x0100_0000u32))
}

/// Default set of mutation operators with their default weights.
pub fn default_mutations() -> Vec<Box<dyn MutationOperator>> {
    vec![
        Box::new(AddInteraction::default()),
        Box::new(ModifyStyle::default()),
        Box::new(AddAnimation::default()),
        Box::new(ChangeLayout::default()),
        Box::new(AddGameElement::default()),
    ]
}

// ============================================================================
// add-interaction
// ============================================================================

const INTERACTION_KINDS: &[&str] = &["click", "hover", "drag", "key"];
const INTERACTION_ACTIONS: &[&str] = &["toggle", "score", "collect", "highlight", "move"];

/// Attaches a `data-evolve-on-*` event trigger to one element.
#[derive(Debug, Clone)]
pub struct AddInteraction {
    pub weight: f32,
}

impl Default for AddInteraction {
    fn default() -> Self {
        Self { weight: 3.0 }
    }
}

impl Operator for AddInteraction {
    fn name(&self) -> &str {
        "add-interaction"
    }

    fn weight(&self) -> f32 {
        self.weight
    }
}

impl MutationOperator for AddInteraction {
    fn apply(&self, markup: &str, rng: &mut dyn RngCore) -> Result<String, OperatorError> {
        let Ok(mut doc) = Document::parse(markup) else {
            return Ok(markup.to_string());
        };
        let Some(node) = pick(&editable_elements(&doc), rng) else {
            return Ok(markup.to_string());
        };

        let kind = INTERACTION_KINDS.choose(rng).copied().unwrap_or("click");
        let attr = format!("data-evolve-on-{kind}");
        let current = doc.attr(node, &attr).map(str::to_string);
        let actions: Vec<&str> = INTERACTION_ACTIONS
            .iter()
            .copied()
            .filter(|a| current.as_deref() != Some(*a))
            .collect();
        let action = actions.choose(rng).copied().unwrap_or("toggle");
        doc.set_attr(node, &attr, action);

        match kind {
            "drag" => doc.set_attr(node, "draggable", "true"),
            "key" if !doc.has_attr(node, "tabindex") => doc.set_attr(node, "tabindex", "0"),
            _ => {}
        }

        Ok(doc.to_html())
    }
}

// ============================================================================
// modify-style
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum StyleKind {
    Pixels(f32, f32),
    Color,
    Opacity,
    Rotate(f32, f32),
    Keyword(&'static [&'static str]),
}

const STYLE_PROPERTIES: &[(&str, StyleKind)] = &[
    ("color", StyleKind::Color),
    ("background", StyleKind::Color),
    ("border-color", StyleKind::Color),
    ("padding", StyleKind::Pixels(0.0, 32.0)),
    ("margin", StyleKind::Pixels(0.0, 32.0)),
    ("border-radius", StyleKind::Pixels(0.0, 24.0)),
    ("font-size", StyleKind::Pixels(10.0, 36.0)),
    ("opacity", StyleKind::Opacity),
    ("transform", StyleKind::Rotate(-20.0, 20.0)),
    (
        "font-weight",
        StyleKind::Keyword(&["normal", "500", "bold", "800"]),
    ),
    (
        "cursor",
        StyleKind::Keyword(&["pointer", "grab", "crosshair", "move"]),
    ),
    (
        "box-shadow",
        StyleKind::Keyword(&[
            "0 2px 6px rgba(0, 0, 0, 0.3)",
            "0 0 12px rgba(80, 160, 255, 0.6)",
            "inset 0 0 4px rgba(0, 0, 0, 0.4)",
        ]),
    ),
];

/// Bounded randomized change to one inline style property.
#[derive(Debug, Clone)]
pub struct ModifyStyle {
    pub weight: f32,
    /// Gaussian step size relative to the property's bounds.
    pub strength: f32,
}

impl Default for ModifyStyle {
    fn default() -> Self {
        Self {
            weight: 2.0,
            strength: 0.25,
        }
    }
}

impl ModifyStyle {
    fn new_value(&self, kind: StyleKind, current: Option<&str>, rng: &mut dyn RngCore) -> String {
        match kind {
            StyleKind::Pixels(lo, hi) => {
                let value = match current.and_then(parse_number) {
                    Some(old) => gaussian_step(rng, old, self.strength, (lo, hi)),
                    None => rng.gen_range(lo..=hi),
                };
                format!("{}px", value.round() as i32)
            }
            StyleKind::Color => random_color(rng),
            StyleKind::Opacity => {
                let value = match current.and_then(parse_number) {
                    Some(old) => gaussian_step(rng, old, self.strength, (0.3, 1.0)),
                    None => rng.gen_range(0.3..=1.0),
                };
                format!("{value:.2}")
            }
            StyleKind::Rotate(lo, hi) => {
                let value = match current.and_then(parse_number) {
                    Some(old) => gaussian_step(rng, old, self.strength, (lo, hi)),
                    None => rng.gen_range(lo..=hi),
                };
                format!("rotate({}deg)", value.round() as i32)
            }
            StyleKind::Keyword(options) => options.choose(rng).copied().unwrap_or("").to_string(),
        }
    }
}

/// First number found in a CSS value, e.g. `12` in `12px` or `-5` in `rotate(-5deg)`.
fn parse_number(value: &str) -> Option<f32> {
    let start = value.find(|c: char| c.is_ascii_digit() || c == '-' || c == '.')?;
    let rest = &value[start..];
    let end = rest
        .char_indices()
        .skip(1)
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map_or(rest.len(), |(i, _)| i);
    rest[..end].parse().ok()
}

impl Operator for ModifyStyle {
    fn name(&self) -> &str {
        "modify-style"
    }

    fn weight(&self) -> f32 {
        self.weight
    }
}

impl MutationOperator for ModifyStyle {
    fn apply(&self, markup: &str, rng: &mut dyn RngCore) -> Result<String, OperatorError> {
        let Ok(mut doc) = Document::parse(markup) else {
            return Ok(markup.to_string());
        };
        let Some(node) = pick(&editable_elements(&doc), rng) else {
            return Ok(markup.to_string());
        };

        // Retry until the chosen property actually changes.
        for _ in 0..8 {
            let Some(&(property, kind)) = STYLE_PROPERTIES.choose(rng) else {
                break;
            };
            let current = doc.style_property(node, property);
            let value = self.new_value(kind, current.as_deref(), rng);
            if current.as_deref() != Some(value.as_str()) {
                doc.set_style_property(node, property, &value);
                return Ok(doc.to_html());
            }
        }

        Ok(markup.to_string())
    }
}

// ============================================================================
// add-animation
// ============================================================================

const ANIMATIONS: &[(&str, &str)] = &[
    (
        "evolve-pulse",
        "0%, 100% { transform: scale(1); } 50% { transform: scale(1.08); }",
    ),
    (
        "evolve-bounce",
        "0%, 100% { transform: translateY(0); } 50% { transform: translateY(-8px); }",
    ),
    (
        "evolve-spin",
        "from { transform: rotate(0deg); } to { transform: rotate(360deg); }",
    ),
    (
        "evolve-fade",
        "0%, 100% { opacity: 1; } 50% { opacity: 0.5; }",
    ),
    (
        "evolve-float",
        "0%, 100% { transform: translate(0, 0); } 50% { transform: translate(4px, -4px); }",
    ),
];

/// Attaches a continuous keyframe animation to one element.
///
/// The keyframes rule is registered once in a shared
/// `<style data-evolve-keyframes>` block.
#[derive(Debug, Clone)]
pub struct AddAnimation {
    pub weight: f32,
}

impl Default for AddAnimation {
    fn default() -> Self {
        Self { weight: 1.5 }
    }
}

impl Operator for AddAnimation {
    fn name(&self) -> &str {
        "add-animation"
    }

    fn weight(&self) -> f32 {
        self.weight
    }
}

impl MutationOperator for AddAnimation {
    fn apply(&self, markup: &str, rng: &mut dyn RngCore) -> Result<String, OperatorError> {
        let Ok(mut doc) = Document::parse(markup) else {
            return Ok(markup.to_string());
        };
        let Some(node) = pick(&editable_elements(&doc), rng) else {
            return Ok(markup.to_string());
        };

        let current = doc.style_property(node, "animation");
        let current_name = current
            .as_deref()
            .and_then(|a| a.split_whitespace().next())
            .map(str::to_string);

        let mut index = rng.gen_range(0..ANIMATIONS.len());
        if current_name.as_deref() == Some(ANIMATIONS[index].0) {
            index = (index + 1) % ANIMATIONS.len();
        }
        let (name, keyframes) = ANIMATIONS[index];
        let duration: f32 = rng.gen_range(0.6..3.0);

        doc.set_style_property(
            node,
            "animation",
            &format!("{name} {duration:.1}s ease-in-out infinite"),
        );
        register_keyframes(&mut doc, name, keyframes);

        Ok(doc.to_html())
    }
}

/// Add `@keyframes name` to the shared block unless it is already there.
fn register_keyframes(doc: &mut Document, name: &str, body: &str) {
    let block = doc
        .elements()
        .into_iter()
        .find(|&id| doc.has_attr(id, KEYFRAMES_MARKER));
    let block = match block {
        Some(id) => id,
        None => doc.append_element(ROOT, "style", vec![Attribute::new(KEYFRAMES_MARKER, "1")]),
    };

    let rule = format!("@keyframes {name} ");
    let existing = doc.text_content(block);
    if !existing.contains(&rule) {
        doc.set_text(block, &format!("{existing}{rule}{{ {body} }}\n"));
    }
}

// ============================================================================
// change-layout
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    FlexRow,
    FlexColumn,
    Grid,
    Reorder,
}

const LAYOUTS: &[Layout] = &[Layout::FlexRow, Layout::FlexColumn, Layout::Grid, Layout::Reorder];

/// Switches a container to flex or grid layout, or reorders its children.
#[derive(Debug, Clone)]
pub struct ChangeLayout {
    pub weight: f32,
}

impl Default for ChangeLayout {
    fn default() -> Self {
        Self { weight: 1.5 }
    }
}

impl Operator for ChangeLayout {
    fn name(&self) -> &str {
        "change-layout"
    }

    fn weight(&self) -> f32 {
        self.weight
    }
}

impl ChangeLayout {
    fn apply_layout(doc: &mut Document, node: NodeId, layout: Layout, rng: &mut dyn RngCore) {
        let gap = format!("{}px", rng.gen_range(0..=24));
        match layout {
            Layout::FlexRow | Layout::FlexColumn => {
                let direction = if layout == Layout::FlexRow {
                    "row"
                } else {
                    "column"
                };
                doc.set_style_property(node, "display", "flex");
                doc.set_style_property(node, "flex-direction", direction);
                doc.set_style_property(node, "align-items", "center");
                doc.set_style_property(node, "gap", &gap);
            }
            Layout::Grid => {
                let columns = rng.gen_range(2..=4);
                doc.set_style_property(node, "display", "grid");
                doc.set_style_property(
                    node,
                    "grid-template-columns",
                    &format!("repeat({columns}, 1fr)"),
                );
                doc.set_style_property(node, "gap", &gap);
            }
            Layout::Reorder => {
                let positions: Vec<usize> = doc
                    .children(node)
                    .iter()
                    .enumerate()
                    .filter(|&(_, &c)| doc.element(c).is_some())
                    .map(|(i, _)| i)
                    .collect();
                if let (Some(&first), Some(&last)) = (positions.first(), positions.last()) {
                    doc.move_child(node, last, first);
                }
            }
        }
    }
}

impl MutationOperator for ChangeLayout {
    fn apply(&self, markup: &str, rng: &mut dyn RngCore) -> Result<String, OperatorError> {
        let Ok(mut doc) = Document::parse(markup) else {
            return Ok(markup.to_string());
        };
        let Some(node) = pick(&container_elements(&doc), rng) else {
            return Ok(markup.to_string());
        };

        let before = doc.outer_html(node);
        let layout = LAYOUTS.choose(rng).copied().unwrap_or(Layout::FlexRow);
        Self::apply_layout(&mut doc, node, layout, rng);

        // Reordering identical children or re-applying the same layout is a
        // no-op; fall back to a fresh flex layout with a different gap.
        if doc.outer_html(node) == before {
            let gap = doc
                .style_property(node, "gap")
                .and_then(|g| g.trim_end_matches("px").parse::<i32>().ok())
                .unwrap_or(0);
            doc.set_style_property(node, "display", "flex");
            doc.set_style_property(node, "gap", &format!("{}px", gap + 4));
        }

        Ok(doc.to_html())
    }
}

// ============================================================================
// add-game-element
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GameRole {
    Player,
    Score,
    Collectible,
    Obstacle,
    Goal,
}

impl GameRole {
    fn as_str(self) -> &'static str {
        match self {
            GameRole::Player => "player",
            GameRole::Score => "score",
            GameRole::Collectible => "collectible",
            GameRole::Obstacle => "obstacle",
            GameRole::Goal => "goal",
        }
    }

    /// Roles that make sense only once per organism.
    fn unique(self) -> bool {
        matches!(self, GameRole::Player | GameRole::Score)
    }
}

const GAME_ROLES: &[GameRole] = &[
    GameRole::Player,
    GameRole::Score,
    GameRole::Collectible,
    GameRole::Obstacle,
    GameRole::Goal,
];

/// Inserts a player, score, collectible, obstacle or goal element wired
/// through `data-evolve-*` attributes.
#[derive(Debug, Clone)]
pub struct AddGameElement {
    pub weight: f32,
}

impl Default for AddGameElement {
    fn default() -> Self {
        Self { weight: 2.0 }
    }
}

impl Operator for AddGameElement {
    fn name(&self) -> &str {
        "add-game-element"
    }

    fn weight(&self) -> f32 {
        self.weight
    }
}

impl AddGameElement {
    fn build(doc: &mut Document, parent: NodeId, role: GameRole, rng: &mut dyn RngCore) {
        let class = Attribute::new("class", format!("evolve-{}", role.as_str()));
        let role_attr = Attribute::new("data-evolve-role", role.as_str());
        let color = random_color(rng);

        match role {
            GameRole::Player => {
                doc.append_element(
                    parent,
                    "div",
                    vec![
                        class,
                        role_attr,
                        Attribute::new("tabindex", "0"),
                        Attribute::new(
                            "style",
                            format!(
                                "position: relative; width: 24px; height: 24px; background: {color}; border-radius: 50%"
                            ),
                        ),
                    ],
                );
            }
            GameRole::Score => {
                let score = doc.append_element(
                    parent,
                    "span",
                    vec![class, role_attr, Attribute::new("aria-live", "polite")],
                );
                doc.append_text(score, "0");
            }
            GameRole::Collectible => {
                let size = rng.gen_range(8..=16);
                doc.append_element(
                    parent,
                    "div",
                    vec![
                        class,
                        role_attr,
                        Attribute::new("data-evolve-on-click", "collect"),
                        Attribute::new(
                            "style",
                            format!(
                                "display: inline-block; width: {size}px; height: {size}px; background: {color}"
                            ),
                        ),
                    ],
                );
            }
            GameRole::Obstacle => {
                let width = rng.gen_range(24..=96);
                doc.append_element(
                    parent,
                    "div",
                    vec![
                        class,
                        role_attr,
                        Attribute::new(
                            "style",
                            format!("width: {width}px; height: 8px; background: {color}"),
                        ),
                    ],
                );
            }
            GameRole::Goal => {
                let goal = doc.append_element(
                    parent,
                    "div",
                    vec![
                        class,
                        role_attr,
                        Attribute::new("data-evolve-on-hover", "highlight"),
                        Attribute::new("style", format!("border: 2px dashed {color}")),
                    ],
                );
                doc.append_text(goal, "Goal");
            }
        }
    }
}

impl MutationOperator for AddGameElement {
    fn apply(&self, markup: &str, rng: &mut dyn RngCore) -> Result<String, OperatorError> {
        let Ok(mut doc) = Document::parse(markup) else {
            return Ok(markup.to_string());
        };

        let present: Vec<&str> = doc
            .elements()
            .into_iter()
            .filter_map(|id| doc.attr(id, "data-evolve-role"))
            .collect();
        let roles: Vec<GameRole> = GAME_ROLES
            .iter()
            .copied()
            .filter(|role| !(role.unique() && present.contains(&role.as_str())))
            .collect();
        let role = roles.choose(rng).copied().unwrap_or(GameRole::Collectible);

        let parent = pick(&container_elements(&doc), rng).unwrap_or(ROOT);
        Self::build(&mut doc, parent, role, rng);

        Ok(doc.to_html())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::EvolutionRng;
    use proptest::prelude::*;

    const SEED: &str = r#"<div class="container"><p>hi</p></div>"#;

    fn edge_inputs() -> Vec<String> {
        vec![
            String::new(),
            "<br/>".to_string(),
            format!("{}x{}", "<div>".repeat(100), "</div>".repeat(100)),
            "<div class=\"unterminated>".to_string(),
            "just text".to_string(),
        ]
    }

    #[test]
    fn test_every_operator_is_total_on_edge_inputs() {
        let mut rng = EvolutionRng::new(42);
        for op in default_mutations() {
            for input in edge_inputs() {
                let out = op.apply(&input, &mut rng);
                assert!(out.is_ok(), "{} failed on {input:?}", op.name());
            }
        }
    }

    #[test]
    fn test_every_operator_changes_seed() {
        let mut rng = EvolutionRng::new(42);
        for op in default_mutations() {
            for _ in 0..20 {
                let out = op.apply(SEED, &mut rng).unwrap();
                assert_ne!(out, SEED, "{} left the seed unchanged", op.name());
                assert!(Document::parse(&out).is_ok());
            }
        }
    }

    #[test]
    fn test_unparseable_markup_is_returned_unchanged() {
        let mut rng = EvolutionRng::new(1);
        let bad = "<div class=\"unterminated>";
        for op in default_mutations() {
            assert_eq!(op.apply(bad, &mut rng).unwrap(), bad);
        }
    }

    #[test]
    fn test_add_game_element_on_empty_markup() {
        let mut rng = EvolutionRng::new(3);
        let out = AddGameElement::default().apply("", &mut rng).unwrap();
        let doc = Document::parse(&out).unwrap();
        let roles: Vec<_> = doc
            .elements()
            .into_iter()
            .filter_map(|id| doc.attr(id, "data-evolve-role"))
            .collect();
        assert_eq!(roles.len(), 1);
    }

    #[test]
    fn test_player_is_added_once() {
        let mut rng = EvolutionRng::new(9);
        let op = AddGameElement::default();
        let mut markup = SEED.to_string();
        for _ in 0..30 {
            markup = op.apply(&markup, &mut rng).unwrap();
        }
        assert!(markup.matches(r#"data-evolve-role="player""#).count() <= 1);
        assert!(markup.matches(r#"data-evolve-role="score""#).count() <= 1);
    }

    #[test]
    fn test_keyframes_registered_once() {
        let mut rng = EvolutionRng::new(7);
        let op = AddAnimation::default();
        let mut markup = SEED.to_string();
        for _ in 0..25 {
            markup = op.apply(&markup, &mut rng).unwrap();
        }
        assert_eq!(markup.matches(KEYFRAMES_MARKER).count(), 1);
        for (name, _) in ANIMATIONS {
            assert!(markup.matches(&format!("@keyframes {name} ")).count() <= 1);
        }
    }

    #[test]
    fn test_add_interaction_sets_trigger() {
        let mut rng = EvolutionRng::new(2);
        let out = AddInteraction::default().apply("<button>go</button>", &mut rng).unwrap();
        assert!(out.contains("data-evolve-on-"));
    }

    #[test]
    fn test_change_layout_reorders_children() {
        let mut doc = Document::parse("<ul><li>1</li><li>2</li><li>3</li></ul>").unwrap();
        let ul = doc.elements()[0];
        let mut rng = EvolutionRng::new(0);
        ChangeLayout::apply_layout(&mut doc, ul, Layout::Reorder, &mut rng);
        assert_eq!(doc.to_html(), "<ul><li>3</li><li>1</li><li>2</li></ul>");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12px"), Some(12.0));
        assert_eq!(parse_number("rotate(-5deg)"), Some(-5.0));
        assert_eq!(parse_number("0.75"), Some(0.75));
        assert_eq!(parse_number("auto"), None);
    }

    proptest! {
        #[test]
        fn prop_operators_never_fail(input in "[a-z<>/=\" ]{0,48}", seed in any::<u64>()) {
            let mut rng = EvolutionRng::new(seed);
            for op in default_mutations() {
                prop_assert!(op.apply(&input, &mut rng).is_ok());
            }
        }
    }
}
