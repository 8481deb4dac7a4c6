//! HTML rendering for annotated documents
//!
//! Renders the document tree back to the markup the annotation page uses.
//! Labels are rendered from their [`LabelData`], not from stale attributes:
//!
//! ```html
//! <span class="tag" data-i="3" data-s="PER" data-h="ab12"
//!       style="background-color:#ff0;color:#000;padding-top:4px;padding-bottom:4px">
//!   Bob<sup class="rel">1</sup><button class="delete">×</button>
//! </span>
//! ```

use serde::{Deserialize, Serialize};

use crate::attr::Attrs;
use crate::config::DisplayType;
use crate::convert::VOID_ELEMENTS;
use crate::node::{Document, Element, ElementKind, LabelData, Node};

// =============================================================================
// RenderConfig
// =============================================================================

/// Configuration for HTML rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Emit badges and delete buttons
    pub chrome: bool,
    /// Emit nesting padding and line height
    pub nesting_styles: bool,
    /// How marker colors are applied
    pub display_type: DisplayType,
    /// Emit the root element itself, not only its children
    pub include_root: bool,
}

impl RenderConfig {
    /// Markup for the live annotation page
    pub const PAGE: Self = Self {
        chrome: true,
        nesting_styles: true,
        display_type: DisplayType::Highlight,
        include_root: false,
    };

    /// Annotated content only: no chrome, no inline styles
    pub const EXPORT: Self = Self {
        chrome: false,
        nesting_styles: false,
        display_type: DisplayType::Highlight,
        include_root: false,
    };

    /// Set the display type
    pub fn with_display_type(mut self, display_type: DisplayType) -> Self {
        self.display_type = display_type;
        self
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::PAGE
    }
}

// =============================================================================
// Document Rendering
// =============================================================================

/// Render a document to HTML string.
pub fn render_document(doc: &Document, config: &RenderConfig) -> String {
    let mut output = String::new();
    if config.include_root {
        render_element(&doc.root, config, &mut output);
    } else {
        render_children(&doc.root, config, &mut output);
    }
    output
}

/// Render a single element to HTML string.
pub fn render_element_to_string(elem: &Element, config: &RenderConfig) -> String {
    let mut output = String::new();
    render_element(elem, config, &mut output);
    output
}

fn render_element(elem: &Element, config: &RenderConfig, output: &mut String) {
    if elem.kind.is_chrome() && !config.chrome {
        return;
    }

    output.push('<');
    output.push_str(&elem.tag);
    match &elem.kind {
        ElementKind::Label(data) => render_label_attrs(data, &elem.attrs, config, output),
        _ => render_attrs(&elem.attrs, output),
    }

    if is_void_element(&elem.tag) {
        output.push_str(" />");
        return;
    }
    output.push('>');
    render_children(elem, config, output);
    output.push_str("</");
    output.push_str(&elem.tag);
    output.push('>');
}

fn render_children(elem: &Element, config: &RenderConfig, output: &mut String) {
    for child in &elem.children {
        match child {
            Node::Element(e) => render_element(e, config, output),
            Node::Text(text) => output.push_str(&escape_html(&text.content)),
        }
    }
}

/// Render attributes to HTML.
fn render_attrs(attrs: &Attrs, output: &mut String) {
    for (name, value) in attrs.iter() {
        push_attr(name, value, output);
    }
}

fn push_attr(name: &str, value: &str, output: &mut String) {
    output.push(' ');
    output.push_str(name);
    output.push_str("=\"");
    output.push_str(&escape_attr(value));
    output.push('"');
}

/// Attributes owned by the label data; anything else passes through
const LABEL_ATTRS: &[&str] = &["class", "style", "data-i", "data-s", "data-h", "data-color", "data-text-color"];

fn render_label_attrs(data: &LabelData, attrs: &Attrs, config: &RenderConfig, output: &mut String) {
    let class = if data.disabled { "tag disabled" } else { "tag" };
    push_attr("class", class, output);
    push_attr("data-i", &data.id.to_attr_value(), output);
    push_attr("data-s", &data.marker, output);
    if let Some(hash) = &data.hash {
        push_attr("data-h", hash, output);
    }
    let style = label_style(data, config);
    if !style.is_empty() {
        push_attr("style", &style, output);
    }
    for (name, value) in attrs.iter().filter(|(k, _)| !LABEL_ATTRS.contains(&k.as_str())) {
        push_attr(name, value, output);
    }
}

/// Inline style of a label: marker colors, then nesting
fn label_style(data: &LabelData, config: &RenderConfig) -> String {
    let mut rules: Vec<String> = Vec::new();
    match config.display_type {
        DisplayType::Highlight => {
            if let Some(color) = &data.color {
                rules.push(format!("background-color:{color}"));
            }
            if let Some(color) = &data.text_color {
                rules.push(format!("color:{color}"));
            }
        }
        DisplayType::Underline => {
            if let Some(color) = &data.color {
                rules.push(format!("border-bottom:3px solid {color}"));
            }
        }
    }
    if config.nesting_styles {
        let style = data.style;
        rules.push(format!("padding-top:{}px", style.padding));
        rules.push(format!("padding-bottom:{}px", style.padding));
        if let Some(height) = style.line_height {
            rules.push(format!("line-height:{height}px"));
        }
    }
    rules.join(";")
}

/// Escape HTML special characters.
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape attribute value special characters.
fn escape_attr(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

/// Check if element is a void element (self-closing).
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::from_html;
    use crate::id::LabelId;
    use crate::node::LabelStyle;

    fn labeled() -> Document {
        let mut data = LabelData::new(LabelId::from_raw(3), "PER").with_colors(Some("#ff0".into()), Some("#000".into()));
        data.hash = Some("ab12".into());
        data.style = LabelStyle {
            depth: 0,
            padding: 4,
            line_height: None,
        };
        let label = Element::label(data)
            .text("Bob")
            .child(Element::badge("1"))
            .child(Element::delete_button());
        Document::new(Element::root().child(Element::paragraph().text("Alice & ").child(label)))
    }

    #[test]
    fn test_render_label() {
        let html = render_document(&labeled(), &RenderConfig::PAGE);
        assert_eq!(
            html,
            "<p>Alice &amp; <span class=\"tag\" data-i=\"3\" data-s=\"PER\" data-h=\"ab12\" \
             style=\"background-color:#ff0;color:#000;padding-top:4px;padding-bottom:4px\">\
             Bob<sup class=\"rel\">1</sup><button class=\"delete\">×</button></span></p>"
        );
    }

    #[test]
    fn test_export_drops_chrome_and_styles() {
        let config = RenderConfig::EXPORT;
        let html = render_document(&labeled(), &config);
        assert!(!html.contains("<button"));
        assert!(!html.contains("<sup"));
        assert!(!html.contains("padding"));
        assert!(html.contains("background-color:#ff0"));

        let underline = render_document(&labeled(), &config.with_display_type(DisplayType::Underline));
        assert!(underline.contains("border-bottom:3px solid #ff0"));
    }

    #[test]
    fn test_render_roundtrips_through_parser() {
        let doc = labeled();
        let html = render_document(&doc, &RenderConfig::EXPORT);
        let parsed = from_html(&html).unwrap();
        assert_eq!(parsed.plain_text(), doc.plain_text());
        let label = parsed.find_element(|e| e.kind.is_label()).unwrap();
        assert_eq!(label.label_data().and_then(|d| d.hash.as_deref()), Some("ab12"));
    }

    #[test]
    fn test_void_and_escape() {
        let doc = Document::new(Element::root().child(Element::paragraph().text("a<b").child(Element::line_break(true))));
        let html = render_document(&doc, &RenderConfig::default());
        assert_eq!(html, "<p>a&lt;b<br class=\"par-break\" /></p>");
        assert!(is_void_element("input"));
        assert!(!is_void_element("span"));
    }
}
