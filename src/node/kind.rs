//! ElementKind and element classification
//!
//! Every element is classified once, from its tag and attributes, into the
//! kind that decides how it takes part in the offset model:
//!
//! | kind         | examples                         | length contribution        |
//! |--------------|----------------------------------|----------------------------|
//! | `Root`       | document wrapper                 | children                   |
//! | `Block`      | `p`, `li`, `h1`, `pre`           | children + 1 (newline)     |
//! | `List`       | `ul`, `ol`                       | 1 (newline) + children     |
//! | `Quote`      | `blockquote`                     | 1 (newline) + children     |
//! | `Container`  | `div`, `section`, `table`        | children                   |
//! | `Scrollable` | `div.scrollable`                 | children                   |
//! | `Pinned`     | `.pinned`                        | 0                          |
//! | `Label`      | `span.tag[data-i][data-s]`       | children                   |
//! | `LineBreak`  | `br`                             | 1                          |
//! | `Chrome`     | `button`, `sup.rel`              | 0                          |
//! | `Script`     | `script`, `style`, `template`    | 0                          |
//! | `Inline`     | `b`, `i`, `a`, `span`, ...       | children                   |

use compact_str::CompactString;

use crate::attr::{Attrs, AttrsExt};
use crate::id::LabelId;

// =============================================================================
// ElementKind
// =============================================================================

/// Classification of an element, with label data carried inline
///
/// Key design: use an enum instead of per-tag string checks
/// - Pattern matching instead of repeated `tag == "..."` comparisons
/// - Label data lives next to the element that renders it
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    /// Document wrapper, contributes only its children
    Root,
    /// Paragraph-like block with an implied trailing newline
    Block,
    /// `ul` / `ol`, opened by an implied newline
    List,
    /// `blockquote`, opened by an implied newline
    Quote,
    /// Layout wrapper that adds no newline of its own
    Container,
    /// Wrapper whose children are spliced into the paragraph sequence
    Scrollable,
    /// Non-markable chrome wrapper
    Pinned,
    /// Annotation label
    Label(LabelData),
    /// `<br>`; `par_break` marks a break that replaced a fused block boundary
    LineBreak { par_break: bool },
    /// Transient UI inside labels (delete button, relation badge)
    Chrome(ChromeKind),
    /// Never rendered as text
    Script,
    /// Any other inline element
    Inline,
}

impl ElementKind {
    // Generates: is_root(), is_block(), is_list(), is_quote(), is_container(), ...
    impl_kind_predicates!(Root, Block, List, Quote, Container, Scrollable, Pinned, Script, Inline);

    /// Check if this is a label
    #[inline]
    pub fn is_label(&self) -> bool {
        matches!(self, Self::Label(_))
    }

    /// Check if this is a line break
    #[inline]
    pub fn is_line_break(&self) -> bool {
        matches!(self, Self::LineBreak { .. })
    }

    /// Check if this is UI chrome
    #[inline]
    pub fn is_chrome(&self) -> bool {
        matches!(self, Self::Chrome(_))
    }

    /// Kinds that never contribute text (chrome, scripts, pinned wrappers)
    #[inline]
    pub fn is_invisible(&self) -> bool {
        matches!(self, Self::Chrome(_) | Self::Script | Self::Pinned)
    }

    /// Kinds that can be dissolved when a label has to cross them
    #[inline]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Block | Self::List | Self::Quote | Self::Container | Self::Scrollable
        )
    }

    /// Implied newlines before the children
    #[inline]
    pub fn leading_newlines(&self) -> usize {
        usize::from(matches!(self, Self::List | Self::Quote))
    }

    /// Implied newlines after the children
    #[inline]
    pub fn trailing_newlines(&self) -> usize {
        usize::from(self.is_block())
    }

    /// Label data, if this is a label
    pub fn label(&self) -> Option<&LabelData> {
        match self {
            Self::Label(data) => Some(data),
            _ => None,
        }
    }

    /// Mutable label data, if this is a label
    pub fn label_mut(&mut self) -> Option<&mut LabelData> {
        match self {
            Self::Label(data) => Some(data),
            _ => None,
        }
    }

    /// Short name for debugging and logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Block => "block",
            Self::List => "list",
            Self::Quote => "quote",
            Self::Container => "container",
            Self::Scrollable => "scrollable",
            Self::Pinned => "pinned",
            Self::Label(_) => "label",
            Self::LineBreak { .. } => "line-break",
            Self::Chrome(ChromeKind::Delete) => "delete-button",
            Self::Chrome(ChromeKind::Badge) => "relation-badge",
            Self::Script => "script",
            Self::Inline => "inline",
        }
    }
}

/// Kinds of transient UI chrome placed inside labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChromeKind {
    /// The `×` button that deletes a label
    Delete,
    /// The relation number badge (`<sup class="rel">`)
    Badge,
}

// =============================================================================
// LabelData
// =============================================================================

/// Data carried by a label element
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelData {
    /// Label id shared by all fragments of the label (`data-i`)
    pub id: LabelId,
    /// Marker short code including its variant suffix (`data-s`)
    pub marker: CompactString,
    /// Background color of the marker
    pub color: Option<String>,
    /// Text color of the marker
    pub text_color: Option<String>,
    /// Server hash of a previously submitted label (`data-h`)
    pub hash: Option<String>,
    /// Restored as undone, shown disabled and never submitted
    pub disabled: bool,
    /// Nesting presentation, recomputed after every mutation
    pub style: LabelStyle,
}

impl LabelData {
    /// Create label data for a marker
    pub fn new(id: LabelId, marker: impl Into<CompactString>) -> Self {
        Self {
            id,
            marker: marker.into(),
            ..Self::default()
        }
    }

    /// Attach marker colors
    pub fn with_colors(mut self, color: Option<String>, text_color: Option<String>) -> Self {
        self.color = color;
        self.text_color = text_color;
        self
    }
}

/// Visual stacking of nested labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LabelStyle {
    /// Number of enclosing labels
    pub depth: usize,
    /// Top and bottom padding in pixels
    pub padding: u32,
    /// Line height in pixels, set on the deepest label of a stack
    pub line_height: Option<u32>,
}

// =============================================================================
// Classification
// =============================================================================

/// Tags that behave like paragraphs in the offset model
pub const BLOCK_TAGS: &[&str] = &[
    "p", "li", "dt", "dd", "h1", "h2", "h3", "h4", "h5", "h6", "pre",
];

/// Layout tags that count only their text
pub const CONTAINER_TAGS: &[&str] = &[
    "div", "section", "article", "header", "footer", "main", "nav", "aside", "dl",
    "table", "thead", "tbody", "tfoot", "tr", "td", "th", "figure", "figcaption",
];

/// Identify the kind of an element by tag name and attributes
///
/// Class markers win over tag names: a `div.scrollable` is a scrollable
/// wrapper, not a block.
pub fn identify_kind(tag: &str, attrs: &Attrs) -> ElementKind {
    if attrs.has_class("pinned") {
        return ElementKind::Pinned;
    }
    if attrs.has_class("scrollable") {
        return ElementKind::Scrollable;
    }

    match tag {
        "span" if attrs.has_class("tag") => ElementKind::Label(label_from_attrs(attrs)),
        "br" => ElementKind::LineBreak {
            par_break: attrs.has_class("par-break"),
        },
        "button" => ElementKind::Chrome(ChromeKind::Delete),
        "sup" if attrs.has_class("rel") => ElementKind::Chrome(ChromeKind::Badge),
        "script" | "style" | "template" | "noscript" => ElementKind::Script,
        "ul" | "ol" => ElementKind::List,
        "blockquote" => ElementKind::Quote,
        _ if BLOCK_TAGS.contains(&tag) => ElementKind::Block,
        _ if CONTAINER_TAGS.contains(&tag) => ElementKind::Container,
        _ => ElementKind::Inline,
    }
}

/// Read label data from `data-*` attributes; a missing `data-i` leaves id 0
/// for the session indexer to assign.
fn label_from_attrs(attrs: &Attrs) -> LabelData {
    LabelData {
        id: attrs
            .data("i")
            .and_then(|v| v.parse().ok())
            .unwrap_or_default(),
        marker: attrs.data("s").unwrap_or_default().into(),
        color: attrs.data("color").map(str::to_owned),
        text_color: attrs.data("text-color").map(str::to_owned),
        hash: attrs.data("h").map(str::to_owned),
        disabled: attrs.has_class("disabled"),
        style: LabelStyle::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attrs {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_identify_kind() {
        assert_eq!(identify_kind("p", &Attrs::new()), ElementKind::Block);
        assert_eq!(identify_kind("li", &Attrs::new()), ElementKind::Block);
        assert_eq!(identify_kind("ul", &Attrs::new()), ElementKind::List);
        assert_eq!(identify_kind("ol", &Attrs::new()), ElementKind::List);
        assert_eq!(identify_kind("blockquote", &Attrs::new()), ElementKind::Quote);
        assert_eq!(identify_kind("div", &Attrs::new()), ElementKind::Container);
        assert_eq!(identify_kind("table", &Attrs::new()), ElementKind::Container);
        assert_eq!(identify_kind("hr", &Attrs::new()), ElementKind::Inline);
        assert_eq!(identify_kind("b", &Attrs::new()), ElementKind::Inline);
        assert_eq!(identify_kind("br", &Attrs::new()), ElementKind::LineBreak { par_break: false });
        assert_eq!(identify_kind("button", &Attrs::new()), ElementKind::Chrome(ChromeKind::Delete));
        assert_eq!(identify_kind("sup", &attrs(&[("class", "rel")])), ElementKind::Chrome(ChromeKind::Badge));
        assert_eq!(identify_kind("sup", &Attrs::new()), ElementKind::Inline);
        assert_eq!(identify_kind("script", &Attrs::new()), ElementKind::Script);
    }

    #[test]
    fn test_newline_contributions() {
        assert_eq!((ElementKind::Block.leading_newlines(), ElementKind::Block.trailing_newlines()), (0, 1));
        assert_eq!((ElementKind::List.leading_newlines(), ElementKind::List.trailing_newlines()), (1, 0));
        assert_eq!((ElementKind::Quote.leading_newlines(), ElementKind::Quote.trailing_newlines()), (1, 0));
        assert_eq!((ElementKind::Container.leading_newlines(), ElementKind::Container.trailing_newlines()), (0, 0));
        assert!(ElementKind::Container.is_structural());
        assert!(!ElementKind::Inline.is_structural());
    }

    #[test]
    fn test_class_markers_win() {
        assert_eq!(identify_kind("div", &attrs(&[("class", "scrollable")])), ElementKind::Scrollable);
        assert_eq!(identify_kind("div", &attrs(&[("class", "box pinned")])), ElementKind::Pinned);
    }

    #[test]
    fn test_label_from_attrs() {
        let kind = identify_kind(
            "span",
            &attrs(&[("class", "tag disabled"), ("data-i", "4"), ("data-s", "PER_1"), ("data-h", "ab12")]),
        );
        let data = kind.label().unwrap();
        assert_eq!(data.id, LabelId::from_raw(4));
        assert_eq!(data.marker, "PER_1");
        assert_eq!(data.hash.as_deref(), Some("ab12"));
        assert!(data.disabled);

        let plain = identify_kind("span", &attrs(&[("class", "note")]));
        assert_eq!(plain, ElementKind::Inline);
    }
}
