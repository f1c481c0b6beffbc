//! Lenient tokenizer that turns markup fragments into a [`Document`].
//!
//! The parser accepts the loose HTML found in generated fragments: void
//! elements need no close tag, stray close tags are dropped and elements left
//! open at the end of input are closed implicitly. Only input that cannot be
//! tokenized at all is rejected.

use std::sync::LazyLock;

use regex::Regex;

use super::document::{Attribute, Document, Element, NodeId, NodeKind, ROOT, is_raw_text, is_void};

/// Maximum element nesting accepted by the parser.
pub const MAX_DEPTH: usize = 256;

/// Comments, declarations and open/close tags.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<!--(?P<comment>.*?)-->|<!(?P<decl>[^>\-][^>]*)>|<(?P<close>/)?(?P<tag>[A-Za-z][A-Za-z0-9:_\-]*)(?P<attrs>(?:[^>"']|"[^"]*"|'[^']*')*)>"#,
    )
    .expect("token pattern compiles")
});

/// `name`, `name=value`, `name="value"` and `name='value'`.
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'=<>/]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("attribute pattern compiles")
});

/// A `<` in text that starts something tag-like but never became a token.
static STRAY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[A-Za-z/!]").expect("stray tag pattern compiles"));

/// Markup parse errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkupError {
    #[error("Malformed tag at byte {offset}")]
    MalformedTag { offset: usize },
    #[error("Unterminated <{tag}> element starting at byte {offset}")]
    UnterminatedRawText { tag: String, offset: usize },
    #[error("Elements nested deeper than {} levels", MAX_DEPTH)]
    TooDeep,
    #[error("Node {0} is not attached to a parent")]
    Detached(NodeId),
}

/// Parse a fragment into a document.
pub(crate) fn parse_document(input: &str) -> Result<Document, MarkupError> {
    let mut doc = Document::new();
    let mut stack: Vec<NodeId> = vec![ROOT];
    let mut pos = 0;

    while pos < input.len() {
        let Some(caps) = TOKEN.captures_at(input, pos) else {
            break;
        };
        let Some(token) = caps.get(0) else {
            break;
        };

        push_text(&mut doc, current(&stack), input, pos, token.start())?;
        pos = token.end();
        let parent = current(&stack);

        if let Some(comment) = caps.name("comment") {
            doc.push_node(parent, NodeKind::Comment(comment.as_str().to_string()));
            continue;
        }
        if let Some(decl) = caps.name("decl") {
            doc.push_node(parent, NodeKind::Declaration(decl.as_str().to_string()));
            continue;
        }
        let Some(tag) = caps.name("tag") else {
            continue;
        };
        let tag = tag.as_str().to_ascii_lowercase();

        if caps.name("close").is_some() {
            // Close the nearest matching open element; ignore strays.
            if let Some(open) = stack
                .iter()
                .rposition(|&id| doc.tag(id) == Some(tag.as_str()))
            {
                stack.truncate(open);
            }
            continue;
        }

        let source = caps.name("attrs").map_or("", |m| m.as_str());
        let self_closing = source.trim_end().ends_with('/');
        let element = Element {
            tag: tag.clone(),
            attributes: parse_attributes(source),
            self_closing,
        };
        let id = doc.push_node(parent, NodeKind::Element(element));

        if self_closing || is_void(&tag) {
            continue;
        }

        if is_raw_text(&tag) {
            let body_end =
                find_raw_text_end(input, pos, &tag).ok_or(MarkupError::UnterminatedRawText {
                    tag: tag.clone(),
                    offset: token.start(),
                })?;
            if body_end > pos {
                doc.push_node(id, NodeKind::Text(input[pos..body_end].to_string()));
            }
            pos = input[body_end..]
                .find('>')
                .map_or(input.len(), |i| body_end + i + 1);
            continue;
        }

        if stack.len() > MAX_DEPTH {
            return Err(MarkupError::TooDeep);
        }
        stack.push(id);
    }

    push_text(&mut doc, current(&stack), input, pos, input.len())?;
    Ok(doc)
}

fn current(stack: &[NodeId]) -> NodeId {
    stack.last().copied().unwrap_or(ROOT)
}

fn push_text(
    doc: &mut Document,
    parent: NodeId,
    input: &str,
    start: usize,
    end: usize,
) -> Result<(), MarkupError> {
    if start >= end {
        return Ok(());
    }
    let text = &input[start..end];
    if let Some(stray) = STRAY_TAG.find(text) {
        return Err(MarkupError::MalformedTag {
            offset: start + stray.start(),
        });
    }
    doc.push_node(parent, NodeKind::Text(text.to_string()));
    Ok(())
}

/// Byte offset of the `</tag` that closes a raw text element.
fn find_raw_text_end(input: &str, from: usize, tag: &str) -> Option<usize> {
    let needle = format!("</{tag}");
    // ASCII lowercasing keeps byte offsets intact.
    input[from..]
        .to_ascii_lowercase()
        .find(&needle)
        .map(|i| from + i)
}

fn parse_attributes(source: &str) -> Vec<Attribute> {
    let mut attributes: Vec<Attribute> = Vec::new();
    for caps in ATTRIBUTE.captures_iter(source) {
        let Some(name) = caps.get(1) else {
            continue;
        };
        let name = name.as_str().to_ascii_lowercase();
        if attributes.iter().any(|a| a.name == name) {
            continue;
        }
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().to_string());
        attributes.push(Attribute { name, value });
    }
    attributes
}
