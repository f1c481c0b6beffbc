//! Inline `style` attribute helpers.

use super::document::{Document, NodeId};

/// Split an inline style into `(property, value)` pairs.
///
/// Property names are lowercased; empty or malformed declarations are dropped.
pub fn parse_declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (property, value) = decl.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim();
            if property.is_empty() || value.is_empty() {
                None
            } else {
                Some((property, value.to_string()))
            }
        })
        .collect()
}

pub fn format_declarations(declarations: &[(String, String)]) -> String {
    declarations
        .iter()
        .map(|(property, value)| format!("{property}: {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Document {
    pub fn style_declarations(&self, id: NodeId) -> Vec<(String, String)> {
        self.attr(id, "style")
            .map(parse_declarations)
            .unwrap_or_default()
    }

    pub fn style_property(&self, id: NodeId, property: &str) -> Option<String> {
        self.style_declarations(id)
            .into_iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v)
    }

    /// Set one inline style property, keeping the others in order.
    pub fn set_style_property(&mut self, id: NodeId, property: &str, value: &str) {
        let mut declarations = self.style_declarations(id);
        match declarations.iter_mut().find(|(p, _)| p == property) {
            Some(decl) => decl.1 = value.to_string(),
            None => declarations.push((property.to_string(), value.to_string())),
        }
        self.set_attr(id, "style", format_declarations(&declarations));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_declarations() {
        let decls = parse_declarations("color: red; ; Margin:0 auto;bogus");
        assert_eq!(
            decls,
            vec![
                ("color".to_string(), "red".to_string()),
                ("margin".to_string(), "0 auto".to_string()),
            ]
        );
    }

    #[test]
    fn test_set_style_property() {
        let mut doc = Document::parse(r#"<div style="color: red">x</div>"#).unwrap();
        let div = doc.elements()[0];
        doc.set_style_property(div, "color", "blue");
        doc.set_style_property(div, "gap", "4px");
        assert_eq!(doc.attr(div, "style"), Some("color: blue; gap: 4px"));
        assert_eq!(doc.style_property(div, "gap").as_deref(), Some("4px"));
    }
}
