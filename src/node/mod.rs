//! Node types for the annotated document tree.
//!
//! This module provides `Element`, `Node`, `Text`, and `Document` types.
//! Every element carries an [`ElementKind`] decided once from its tag and
//! attributes, which drives the offset model and label handling.
//!
//! # Key Features
//!
//! - Kind-based classification instead of repeated tag comparisons
//! - Labels carry their data (`LabelData`) inline in the kind
//! - Path addressing (`NodePath`, `Boundary`, `DomRange`) for DOM-like ranges

mod document;
mod element;
mod kind;
mod path;
mod text;

pub use document::{Document, ElementIterator, Stats};
pub use element::Element;
pub use kind::{identify_kind, ChromeKind, ElementKind, LabelData, LabelStyle, BLOCK_TAGS, CONTAINER_TAGS};
pub use path::{child_path, common_prefix, is_ancestor, parent_of, Boundary, DomRange, NodePath};
pub use text::Text;

use smallvec::SmallVec;

/// Node in the document tree - either Element or Text.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Box<Element>),
    Text(Text),
}

impl Node {
    // Generates: is_element(), as_element(), as_element_mut(), is_text(), as_text(), as_text_mut()
    impl_enum_accessors!(element: Box<Element>, text: Text);

    /// Create a text node
    pub fn text(content: impl Into<String>) -> Self {
        Node::Text(Text::new(content))
    }

    /// Create an element node
    pub fn element(elem: Element) -> Self {
        Node::Element(Box::new(elem))
    }

    /// Kind of the element, `None` for text
    #[inline]
    pub fn kind(&self) -> Option<&ElementKind> {
        self.as_element().map(|e| &e.kind)
    }
}

impl From<Element> for Node {
    fn from(elem: Element) -> Self {
        Node::element(elem)
    }
}

impl From<Text> for Node {
    fn from(text: Text) -> Self {
        Node::Text(text)
    }
}

/// Type alias for children collection.
pub type Children = SmallVec<[Node; 8]>;
