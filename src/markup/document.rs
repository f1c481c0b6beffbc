//! Arena-backed document tree for markup fragments.

use std::fmt::Write as _;

use super::parse::{self, MarkupError};

/// Index of a node inside a [`Document`].
pub type NodeId = usize;

/// The fragment root. It has no tag and is never serialized itself.
pub const ROOT: NodeId = 0;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Elements that never have content or a close tag.
pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Elements whose body is kept verbatim.
pub fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

/// A single attribute. `value` is `None` for bare flags like `hidden`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// An element node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased tag name.
    pub tag: String,
    pub attributes: Vec<Attribute>,
    /// Written as `<tag />` in the source.
    pub self_closing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Element(Element),
    Text(String),
    Comment(String),
    Declaration(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed fragment.
///
/// Nodes live in an arena and refer to each other by [`NodeId`]. Detached
/// nodes stay in the arena but are unreachable from [`ROOT`], so they never
/// show up in queries or serialization.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

enum Step {
    Enter(NodeId),
    Leave(NodeId),
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse a markup fragment.
    pub fn parse(input: &str) -> Result<Self, MarkupError> {
        parse::parse_document(input)
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id).map(|n| &n.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.nodes.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map_or(&[], |n| n.children.as_slice())
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some())
            .collect()
    }

    /// All nodes below `id` in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// All attached elements in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        self.descendants(ROOT)
            .into_iter()
            .filter(|&id| self.element(id).is_some())
            .collect()
    }

    /// Distance from the root; top-level nodes have depth 1.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut node = id;
        while let Some(parent) = self.parent(node) {
            depth += 1;
            node = parent;
        }
        depth
    }

    /// Deepest element nesting in the document.
    pub fn max_depth(&self) -> usize {
        self.elements()
            .into_iter()
            .map(|id| self.depth(id))
            .max()
            .unwrap_or(0)
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        self.element(id).map_or(&[], |e| e.attributes.as_slice())
    }

    /// Attribute value; bare flags read as `""`.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attributes(id).iter().any(|a| a.name == name)
    }

    /// Set or overwrite an attribute. No-op for non-element nodes.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let Some(element) = self.element_mut(id) else {
            return;
        };
        let value = value.into();
        match element.attributes.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = Some(value),
            None => element.attributes.push(Attribute::new(name, value)),
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<Attribute> {
        let element = self.element_mut(id)?;
        let index = element.attributes.iter().position(|a| a.name == name)?;
        Some(element.attributes.remove(index))
    }

    pub(crate) fn push_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.alloc(kind, Some(parent));
        self.nodes[parent].children.push(id);
        id
    }

    fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Append a new element as the last child of `parent`.
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: Vec<Attribute>,
    ) -> NodeId {
        self.push_node(
            parent,
            NodeKind::Element(Element {
                tag: tag.to_ascii_lowercase(),
                attributes,
                self_closing: false,
            }),
        )
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push_node(parent, NodeKind::Text(text.to_string()))
    }

    /// Parse `html` and append its nodes to `parent`.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Result<(), MarkupError> {
        let fragment = Document::parse(html)?;
        let at = self.children(parent).len();
        self.graft(parent, at, &fragment);
        Ok(())
    }

    /// Replace the children of `id` with the nodes parsed from `html`.
    ///
    /// The document is left untouched if `html` does not parse.
    pub fn set_inner_html(&mut self, id: NodeId, html: &str) -> Result<(), MarkupError> {
        let fragment = Document::parse(html)?;
        self.detach_children(id);
        self.graft(id, 0, &fragment);
        Ok(())
    }

    /// Replace `id` itself with the nodes parsed from `html`.
    pub fn replace_with_html(&mut self, id: NodeId, html: &str) -> Result<(), MarkupError> {
        let parent = self.parent(id).ok_or(MarkupError::Detached(id))?;
        let fragment = Document::parse(html)?;
        let siblings = &mut self.nodes[parent].children;
        let Some(index) = siblings.iter().position(|&c| c == id) else {
            return Err(MarkupError::Detached(id));
        };
        siblings.remove(index);
        self.nodes[id].parent = None;
        self.graft(parent, index, &fragment);
        Ok(())
    }

    /// Replace the children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        self.detach_children(id);
        self.append_text(id, text);
    }

    /// Move the child at position `from` to position `to` among its siblings.
    pub fn move_child(&mut self, parent: NodeId, from: usize, to: usize) {
        let Some(node) = self.nodes.get_mut(parent) else {
            return;
        };
        if from >= node.children.len() || to >= node.children.len() {
            return;
        }
        let child = node.children.remove(from);
        node.children.insert(to, child);
    }

    fn detach_children(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let children = std::mem::take(&mut node.children);
        for child in children {
            self.nodes[child].parent = None;
        }
    }

    /// Copy the top-level nodes of `fragment` under `parent`, starting at `at`.
    fn graft(&mut self, parent: NodeId, at: usize, fragment: &Document) {
        let mut stack: Vec<(NodeId, NodeId)> = Vec::new();
        let mut top_level = Vec::new();
        for &child in fragment.children(ROOT) {
            let id = self.alloc(fragment.nodes[child].kind.clone(), Some(parent));
            top_level.push(id);
            stack.push((child, id));
        }

        let siblings = &mut self.nodes[parent].children;
        let at = at.min(siblings.len());
        siblings.splice(at..at, top_level);

        while let Some((source, target)) = stack.pop() {
            for &child in fragment.children(source) {
                let id = self.push_node(target, fragment.nodes[child].kind.clone());
                stack.push((child, id));
            }
        }
    }

    /// Concatenated text below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| match self.kind(n) {
                Some(NodeKind::Text(text)) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_nodes(self.children(id), &mut out);
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_nodes(&[id], &mut out);
        out
    }

    /// Serialize the whole fragment.
    pub fn to_html(&self) -> String {
        self.inner_html(ROOT)
    }

    fn write_nodes(&self, roots: &[NodeId], out: &mut String) {
        let mut stack: Vec<Step> = roots.iter().rev().map(|&id| Step::Enter(id)).collect();

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(id) => match &self.nodes[id].kind {
                    NodeKind::Root => {
                        stack.extend(self.children(id).iter().rev().map(|&c| Step::Enter(c)));
                    }
                    NodeKind::Element(element) => {
                        let children = self.children(id);
                        let closes = !children.is_empty()
                            || !(element.self_closing || is_void(&element.tag));
                        write_open_tag(element, closes, out);
                        if closes {
                            stack.push(Step::Leave(id));
                            stack.extend(children.iter().rev().map(|&c| Step::Enter(c)));
                        }
                    }
                    NodeKind::Text(text) => out.push_str(text),
                    NodeKind::Comment(text) => {
                        let _ = write!(out, "<!--{text}-->");
                    }
                    NodeKind::Declaration(text) => {
                        let _ = write!(out, "<!{text}>");
                    }
                },
                Step::Leave(id) => {
                    if let Some(tag) = self.tag(id) {
                        let _ = write!(out, "</{tag}>");
                    }
                }
            }
        }
    }
}

fn write_open_tag(element: &Element, closes: bool, out: &mut String) {
    out.push('<');
    out.push_str(&element.tag);
    for attr in &element.attributes {
        out.push(' ');
        out.push_str(&attr.name);
        match &attr.value {
            None => {}
            Some(value) if value.contains('"') && !value.contains('\'') => {
                let _ = write!(out, "='{value}'");
            }
            Some(value) => {
                let _ = write!(out, "=\"{}\"", value.replace('"', "&quot;"));
            }
        }
    }
    if !closes && element.self_closing {
        out.push_str(" />");
    } else {
        out.push('>');
    }
}
