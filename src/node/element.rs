//! Element type - HTML elements with kind classification
//!
//! The core building block of the document tree.

use crate::attr::{Attrs, AttrsExt};
use crate::id::LabelId;

use super::kind::{identify_kind, ChromeKind, ElementKind, LabelData};
use super::{Children, Node, Text};

// =============================================================================
// Element
// =============================================================================

/// HTML element with children and its kind classification
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// HTML tag name
    pub tag: String,
    /// Element attributes
    pub attrs: Attrs,
    /// Child nodes
    pub children: Children,
    /// Offset-model classification (and label data)
    pub kind: ElementKind,
}

impl Element {
    /// Create an element, classifying it from its tag alone
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let kind = identify_kind(&tag, &Attrs::new());
        Self::with_kind(tag, kind)
    }

    /// Create an element with an explicit kind
    pub fn with_kind(tag: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Children::new(),
            kind,
        }
    }

    /// Auto-detect kind from tag name and attributes, keeping the attributes
    pub fn auto(tag: impl Into<String>, attrs: Attrs) -> Self {
        let tag = tag.into();
        let kind = identify_kind(&tag, &attrs);
        Self {
            tag,
            attrs,
            children: Children::new(),
            kind,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Kind-specific constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Document root wrapper
    pub fn root() -> Self {
        Self::with_kind("article", ElementKind::Root)
    }

    /// Paragraph block
    pub fn paragraph() -> Self {
        Self::with_kind("p", ElementKind::Block)
    }

    /// Label element (`span.tag`)
    pub fn label(data: LabelData) -> Self {
        let mut elem = Self::with_kind("span", ElementKind::Label(data));
        elem.attrs.set_attr("class", "tag");
        elem
    }

    /// Line break; `par_break` marks a fused block boundary
    pub fn line_break(par_break: bool) -> Self {
        let mut elem = Self::with_kind("br", ElementKind::LineBreak { par_break });
        if par_break {
            elem.attrs.set_attr("class", "par-break");
        }
        elem
    }

    /// Delete button placed at the end of a label
    pub fn delete_button() -> Self {
        let mut elem = Self::with_kind("button", ElementKind::Chrome(ChromeKind::Delete));
        elem.attrs.set_attr("class", "delete");
        elem.push_text("×");
        elem
    }

    /// Relation badge showing a relation number or `+`
    pub fn badge(text: impl Into<String>) -> Self {
        let mut elem = Self::with_kind("sup", ElementKind::Chrome(ChromeKind::Badge));
        elem.attrs.set_attr("class", "rel");
        elem.push_text(text);
        elem
    }

    /// Shallow copy: same tag, attributes and kind, no children
    pub fn shell(&self) -> Self {
        Self {
            tag: self.tag.clone(),
            attrs: self.attrs.clone(),
            children: Children::new(),
            kind: self.kind.clone(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder API
    // ─────────────────────────────────────────────────────────────────────────

    /// Add an attribute (builder)
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.set_attr(name, value);
        self.kind = match self.kind {
            ElementKind::Label(data) => ElementKind::Label(data),
            _ => identify_kind(&self.tag, &self.attrs),
        };
        self
    }

    /// Set the class attribute (builder)
    pub fn with_class(self, class: impl Into<String>) -> Self {
        self.attr("class", class)
    }

    /// Add a child element (builder)
    pub fn child(mut self, elem: Element) -> Self {
        self.push_elem(elem);
        self
    }

    /// Add a text child (builder)
    pub fn text(mut self, content: impl Into<String>) -> Self {
        self.push_text(content);
        self
    }

    /// Append a child element
    pub fn push_elem(&mut self, elem: Element) {
        self.children.push(Node::Element(Box::new(elem)));
    }

    /// Append a text child
    pub fn push_text(&mut self, content: impl Into<String>) {
        self.children.push(Node::Text(Text::new(content)));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Attribute access
    // ─────────────────────────────────────────────────────────────────────────

    /// Get attribute value by name
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.get_attr(name)
    }

    /// Set attribute value (update if exists, add if not)
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.set_attr(name, value);
    }

    /// Check if attribute exists
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.has_attr(name)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Label helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Label data, if this element is a label
    pub fn label_data(&self) -> Option<&LabelData> {
        self.kind.label()
    }

    /// Mutable label data, if this element is a label
    pub fn label_data_mut(&mut self) -> Option<&mut LabelData> {
        self.kind.label_mut()
    }

    /// Label id, if this element is a label
    pub fn label_id(&self) -> Option<LabelId> {
        self.label_data().map(|d| d.id)
    }

    /// Check if this is a label fragment of `id`
    pub fn is_label_of(&self, id: LabelId) -> bool {
        self.label_id() == Some(id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Other helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Check if element has no children
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of direct children (all node types)
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Iterate over child element references
    pub fn children_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| n.as_element().map(|e| &**e))
    }

    /// First child element
    pub fn first_child(&self) -> Option<&Element> {
        self.children_elements().next()
    }

    /// Check if the element holds no visible content (only chrome or nothing)
    pub fn is_visually_empty(&self) -> bool {
        self.children.iter().all(|n| match n {
            Node::Text(t) => t.is_empty(),
            Node::Element(e) => {
                e.kind.is_invisible() || (!e.kind.is_line_break() && e.is_visually_empty())
            }
        })
    }

    /// Text content without chrome, scripts or pinned wrappers
    ///
    /// Line breaks and block boundaries add nothing, as with DOM `textContent`.
    pub fn text_content(&self) -> String {
        let mut result = String::new();
        self.collect_text(&mut result);
        result
    }

    fn collect_text(&self, buf: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) => buf.push_str(&t.content),
                Node::Element(e) if e.kind.is_invisible() => {}
                Node::Element(e) => e.collect_text(buf),
            }
        }
    }

    /// Logical plain text: the text that document offsets index into
    ///
    /// Each line break yields `\n`, each block a trailing `\n`, each list
    /// or blockquote a leading `\n`.
    pub fn plain_text(&self) -> String {
        let mut result = String::new();
        self.write_plain(&mut result);
        result
    }

    pub(crate) fn write_plain(&self, buf: &mut String) {
        match &self.kind {
            kind if kind.is_invisible() => return,
            ElementKind::LineBreak { .. } => {
                buf.push('\n');
                return;
            }
            _ => {}
        }
        buf.extend(std::iter::repeat_n('\n', self.kind.leading_newlines()));
        for child in &self.children {
            match child {
                Node::Text(t) => buf.push_str(&t.content),
                Node::Element(e) => e.write_plain(buf),
            }
        }
        buf.extend(std::iter::repeat_n('\n', self.kind.trailing_newlines()));
    }
}
