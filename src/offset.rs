//! Length and offset model
//!
//! Every node contributes a fixed number of characters to the logical
//! document text ([`Document::plain_text`]):
//!
//! - text: its character count
//! - `Block` (`p`, `li`, headings): its children plus one trailing newline
//! - `List` / `Quote` (`ul`, `ol`, `blockquote`): one leading newline plus its children
//! - `LineBreak`: one newline
//! - `Label` / `Inline` / `Container` / `Scrollable` / `Root`: its children
//! - `Chrome` / `Script` / `Pinned`: nothing
//!
//! Chrome is never measured, so no hide-then-restore dance is needed.

use crate::node::{Boundary, Document, DomRange, Element, ElementKind, Node, NodePath};

// =============================================================================
// Node lengths
// =============================================================================

/// Characters a node contributes to the logical text
pub fn node_length(node: &Node) -> usize {
    match node {
        Node::Text(t) => t.len(),
        Node::Element(e) => element_length(e),
    }
}

/// Characters an element contributes to the logical text
pub fn element_length(elem: &Element) -> usize {
    match &elem.kind {
        kind if kind.is_invisible() => 0,
        ElementKind::LineBreak { .. } => 1,
        kind => {
            let inner: usize = elem.children.iter().map(node_length).sum();
            kind.leading_newlines() + inner + kind.trailing_newlines()
        }
    }
}

/// Total length of the first `count` children of `elem`
pub fn children_length(elem: &Element, count: usize) -> usize {
    elem.children.iter().take(count).map(node_length).sum()
}

// =============================================================================
// Absolute offsets
// =============================================================================

/// Absolute offset at which the node at `path` starts
///
/// Returns `None` for a dangling path (an index out of range, or a path
/// continuing below a text node).
pub fn previous_text_length(doc: &Document, path: &[usize]) -> Option<usize> {
    let mut offset = 0;
    let mut elem = &doc.root;
    for (depth, &index) in path.iter().enumerate() {
        let child = elem.children.get(index)?;
        offset += children_length(elem, index);
        if depth + 1 < path.len() {
            elem = child.as_element()?;
            offset += elem.kind.leading_newlines();
        }
    }
    Some(offset)
}

/// Absolute offset of a boundary point
///
/// A text container takes a character offset, an element container a
/// child index. Out-of-range offsets yield `None`.
pub fn boundary_offset(doc: &Document, boundary: &Boundary) -> Option<usize> {
    let base = previous_text_length(doc, &boundary.path)?;
    if boundary.path.is_empty() {
        return (boundary.offset <= doc.root.children.len())
            .then(|| children_length(&doc.root, boundary.offset));
    }
    match doc.node_at(&boundary.path)? {
        Node::Text(t) => (boundary.offset <= t.len()).then_some(base + boundary.offset),
        Node::Element(e) => {
            if boundary.offset > e.children.len() {
                return None;
            }
            // After a leading newline, before a trailing one
            Some(base + e.kind.leading_newlines() + children_length(e, boundary.offset))
        }
    }
}

/// Logical length covered by a range (`None` if reversed or dangling)
pub fn range_length(doc: &Document, range: &DomRange) -> Option<usize> {
    let start = boundary_offset(doc, &range.start)?;
    let end = boundary_offset(doc, &range.end)?;
    end.checked_sub(start)
}

// =============================================================================
// OffsetIndex
// =============================================================================

/// Kind of a leaf in the offset index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    /// A non-empty text run
    Text,
    /// A `<br>` element
    LineBreak,
    /// The implied newline opening a list or blockquote
    BlockStart,
    /// The implied newline after a block; `children` is the block's child count
    BlockEnd { children: usize },
}

/// One contiguous piece of the logical text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    /// Path of the text node, line break or block
    pub path: NodePath,
    /// Absolute start offset
    pub start: usize,
    /// Characters covered
    pub len: usize,
    pub kind: LeafKind,
}

impl Leaf {
    /// Exclusive end offset
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Direction in which an offset snaps to a boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Start boundaries: resolve inside the leaf holding the character at `offset`
    Forward,
    /// End boundaries: resolve inside the leaf holding the character before `offset`
    Backward,
}

/// Ordered leaves of the logical text, built by one traversal
///
/// The index is a snapshot: any mutation of the document invalidates it.
#[derive(Debug, Clone, Default)]
pub struct OffsetIndex {
    leaves: Vec<Leaf>,
    len: usize,
    root_children: usize,
}

impl OffsetIndex {
    /// Build the index for a document
    pub fn build(doc: &Document) -> Self {
        let mut index = Self {
            leaves: Vec::new(),
            len: 0,
            root_children: doc.root.children.len(),
        };
        let mut path = NodePath::new();
        index.index_element(&doc.root, &mut path);
        index
    }

    fn index_element(&mut self, elem: &Element, path: &mut NodePath) {
        for (i, child) in elem.children.iter().enumerate() {
            path.push(i);
            match child {
                Node::Text(t) if !t.is_empty() => self.push(path, t.len(), LeafKind::Text),
                Node::Text(_) => {}
                Node::Element(e) if e.kind.is_invisible() => {}
                Node::Element(e) if e.kind.is_line_break() => self.push(path, 1, LeafKind::LineBreak),
                Node::Element(e) => {
                    if e.kind.leading_newlines() > 0 {
                        self.push(path, e.kind.leading_newlines(), LeafKind::BlockStart);
                    }
                    self.index_element(e, path);
                    if e.kind.trailing_newlines() > 0 {
                        self.push(path, 1, LeafKind::BlockEnd { children: e.children.len() });
                    }
                }
            }
            path.pop();
        }
    }

    fn push(&mut self, path: &NodePath, len: usize, kind: LeafKind) {
        self.leaves.push(Leaf {
            path: path.clone(),
            start: self.len,
            len,
            kind,
        });
        self.len += len;
    }

    /// Total logical length
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the document has no logical text
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All leaves in document order
    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    /// Leaf holding the character at `offset`
    pub fn leaf_at(&self, offset: usize) -> Option<&Leaf> {
        let i = self.leaves.partition_point(|leaf| leaf.end() <= offset);
        self.leaves.get(i).filter(|leaf| leaf.start <= offset)
    }

    /// Resolve an absolute offset to a boundary point
    ///
    /// `Forward` puts an offset sitting between two text runs at the start
    /// of the later run; `Backward` puts it at the end of the earlier run.
    /// Offsets past the end yield `None`.
    pub fn locate(&self, offset: usize, bias: Bias) -> Option<Boundary> {
        if offset > self.len {
            return None;
        }
        match bias {
            Bias::Forward => {
                let Some(leaf) = self.leaf_at(offset) else {
                    return Some(Boundary::at_root(self.root_children));
                };
                match leaf.kind {
                    LeafKind::Text => Some(Boundary::new(&leaf.path, offset - leaf.start)),
                    LeafKind::LineBreak | LeafKind::BlockStart => Boundary::before(&leaf.path),
                    LeafKind::BlockEnd { children } => Some(Boundary::new(&leaf.path, children)),
                }
            }
            Bias::Backward => {
                if offset == 0 {
                    return Some(Boundary::at_root(0));
                }
                let leaf = self.leaf_at(offset - 1)?;
                match leaf.kind {
                    LeafKind::Text => Some(Boundary::new(&leaf.path, offset - leaf.start)),
                    LeafKind::BlockStart => Some(Boundary::new(&leaf.path, 0)),
                    LeafKind::LineBreak | LeafKind::BlockEnd { .. } => Boundary::after(&leaf.path),
                }
            }
        }
    }

    /// Resolve a span to a DOM range (start snapped forward, end backward)
    pub fn locate_span(&self, span: crate::span::Span) -> Option<DomRange> {
        let start = self.locate(span.start, Bias::Forward)?;
        let end = self.locate(span.end, Bias::Backward)?;
        Some(DomRange::new(start, end))
    }
}

// =============================================================================
// Paragraphs
// =============================================================================

/// A paragraph-level node and its extent in the logical text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub path: NodePath,
    pub start: usize,
    pub end: usize,
}

impl Paragraph {
    /// Check if an offset falls inside this paragraph
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// Paragraph-level nodes in document order
///
/// `Scrollable` and `Container` wrappers are flattened into their children
/// and `Pinned` wrappers are skipped.
pub fn paragraphs(doc: &Document) -> Vec<Paragraph> {
    fn walk(elem: &Element, path: &mut NodePath, acc: &mut usize, out: &mut Vec<Paragraph>) {
        for (i, child) in elem.children.iter().enumerate() {
            path.push(i);
            match child {
                Node::Element(e) if e.kind.is_pinned() => {}
                Node::Element(e) if e.kind.is_scrollable() || e.kind.is_container() => {
                    walk(e, path, acc, out)
                }
                node => {
                    let len = node_length(node);
                    if len > 0 {
                        out.push(Paragraph {
                            path: path.clone(),
                            start: *acc,
                            end: *acc + len,
                        });
                    }
                    *acc += len;
                }
            }
            path.pop();
        }
    }

    let mut out = Vec::new();
    walk(&doc.root, &mut NodePath::new(), &mut 0, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::LabelId;
    use crate::node::LabelData;
    use crate::span::Span;

    fn labeled() -> Document {
        // "Alice met Bob\n" + "in Paris.\n"
        let label = Element::label(LabelData::new(LabelId::from_raw(1), "PER"))
            .text("Bob")
            .child(Element::badge("1"))
            .child(Element::delete_button());
        let root = Element::root()
            .child(Element::paragraph().text("Alice met ").child(label))
            .child(Element::paragraph().text("in").child(Element::line_break(false)).text("Paris."));
        Document::new(root)
    }

    #[test]
    fn test_node_length_rules() {
        let doc = labeled();
        assert_eq!(doc.plain_text(), "Alice met Bob\nin\nParis.\n");
        assert_eq!(element_length(&doc.root), 24);
        assert_eq!(doc.element_at(&[0, 1]).map(element_length), Some(3));
        assert_eq!(doc.element_at(&[0, 1, 1]).map(element_length), Some(0));
    }

    #[test]
    fn test_previous_text_length() {
        let doc = labeled();
        assert_eq!(previous_text_length(&doc, &[0, 1]), Some(10));
        assert_eq!(previous_text_length(&doc, &[0, 1, 0]), Some(10));
        assert_eq!(previous_text_length(&doc, &[1]), Some(14));
        assert_eq!(previous_text_length(&doc, &[1, 2]), Some(17));
        assert_eq!(previous_text_length(&doc, &[4]), None);
        assert_eq!(previous_text_length(&doc, &[0, 0, 0]), None);
    }

    #[test]
    fn test_boundary_offset_and_range_length() {
        let doc = labeled();
        let start = Boundary::new([0, 1, 0], 0);
        let end = Boundary::new([1, 2], 5);
        assert_eq!(boundary_offset(&doc, &start), Some(10));
        assert_eq!(boundary_offset(&doc, &end), Some(22));
        assert_eq!(boundary_offset(&doc, &Boundary::new([0], 2)), Some(13));
        assert_eq!(boundary_offset(&doc, &Boundary::new([1, 2], 9)), None);
        assert_eq!(range_length(&doc, &DomRange::new(start.clone(), end.clone())), Some(12));
        assert_eq!(range_length(&doc, &DomRange::new(end, start)), None);
    }

    #[test]
    fn test_locate_snaps_between_runs() {
        let doc = labeled();
        let index = OffsetIndex::build(&doc);
        assert_eq!(index.len(), 24);

        // Offset 10 sits between "Alice met " and "Bob"
        assert_eq!(index.locate(10, Bias::Forward), Some(Boundary::new([0, 1, 0], 0)));
        assert_eq!(index.locate(10, Bias::Backward), Some(Boundary::new([0, 0], 10)));

        // Offset 13 is the paragraph newline
        assert_eq!(index.locate(13, Bias::Backward), Some(Boundary::new([0, 1, 0], 3)));
        assert_eq!(index.locate(13, Bias::Forward), Some(Boundary::new([0], 2)));
        assert_eq!(index.locate(14, Bias::Backward), Some(Boundary::at_root(1)));

        // The <br> after "in"
        assert_eq!(index.locate(16, Bias::Forward), Some(Boundary::new([1], 1)));
        assert_eq!(index.locate(17, Bias::Backward), Some(Boundary::new([1], 2)));
        assert_eq!(index.locate(99, Bias::Forward), None);
    }

    #[test]
    fn test_offset_round_trip() {
        let doc = labeled();
        let index = OffsetIndex::build(&doc);
        for offset in 0..index.len() {
            let start = index.locate(offset, Bias::Forward).unwrap();
            assert_eq!(boundary_offset(&doc, &start), Some(offset), "forward {offset}");
            let end = index.locate(offset + 1, Bias::Backward).unwrap();
            assert_eq!(boundary_offset(&doc, &end), Some(offset + 1), "backward {offset}");
        }
        let range = index.locate_span(Span::new(10, 13)).unwrap();
        assert_eq!(range_length(&doc, &range), Some(3));
    }

    fn text_at(doc: &Document, span: Span) -> String {
        doc.plain_text().chars().skip(span.start).take(span.len()).collect()
    }

    #[test]
    fn test_list_opens_with_newline() {
        let doc = crate::convert::from_html("<p>Hi</p><ul><li>ab</li><li>cd</li></ul>").unwrap();
        assert_eq!(doc.plain_text(), "Hi\n\nab\ncd\n");
        assert_eq!(doc.len(), 10);
        assert_eq!(text_at(&doc, Span::new(4, 6)), "ab");
        assert_eq!(previous_text_length(&doc, &[1, 0, 0]), Some(4));
        assert_eq!(previous_text_length(&doc, &[1, 1]), Some(7));

        let index = OffsetIndex::build(&doc);
        assert_eq!(index.len(), 10);
        let range = index.locate_span(Span::new(4, 6)).unwrap();
        assert_eq!(range.start, Boundary::new([1, 0, 0], 0));
        assert_eq!(range.end, Boundary::new([1, 0, 0], 2));

        // The list newline itself
        assert_eq!(index.locate(3, Bias::Forward), Some(Boundary::at_root(1)));
        assert_eq!(index.locate(4, Bias::Backward), Some(Boundary::new([1], 0)));
        assert_eq!(boundary_offset(&doc, &Boundary::new([1], 0)), Some(4));
    }

    #[test]
    fn test_blockquote_opens_with_newline() {
        let doc = crate::convert::from_html("<p>Hi</p><blockquote><p>ab</p></blockquote>").unwrap();
        assert_eq!(doc.plain_text(), "Hi\n\nab\n");
        assert_eq!(text_at(&doc, Span::new(4, 6)), "ab");
        let range = OffsetIndex::build(&doc).locate_span(Span::new(4, 6)).unwrap();
        assert_eq!(range.start, Boundary::new([1, 0, 0], 0));
        assert_eq!(range_length(&doc, &range), Some(2));
    }

    #[test]
    fn test_div_counts_only_text() {
        let doc = crate::convert::from_html("<div>Hi</div><p>ab</p>").unwrap();
        assert_eq!(doc.plain_text(), "Hiab\n");
        assert_eq!(text_at(&doc, Span::new(2, 4)), "ab");
        let range = OffsetIndex::build(&doc).locate_span(Span::new(2, 4)).unwrap();
        assert_eq!(range.start, Boundary::new([1, 0], 0));
        assert_eq!(range.end, Boundary::new([1, 0], 2));
    }

    #[test]
    fn test_nested_lists_round_trip() {
        let doc = crate::convert::from_html(
            "<section><p>a</p><ol><li>b<ul><li>c</li></ul></li></ol></section><blockquote>d</blockquote>",
        )
        .unwrap();
        assert_eq!(doc.plain_text(), "a\n\nb\nc\n\n\nd");
        let index = OffsetIndex::build(&doc);
        assert_eq!(index.len(), element_length(&doc.root));
        for offset in 0..index.len() {
            let start = index.locate(offset, Bias::Forward).unwrap();
            assert_eq!(boundary_offset(&doc, &start), Some(offset), "forward {offset}");
            let end = index.locate(offset + 1, Bias::Backward).unwrap();
            assert_eq!(boundary_offset(&doc, &end), Some(offset + 1), "backward {offset}");
        }
    }

    #[test]
    fn test_paragraphs_flatten_scrollable() {
        let root = Element::root()
            .child(Element::new("div").with_class("pinned").child(Element::paragraph().text("nav")))
            .child(
                Element::new("div")
                    .with_class("scrollable")
                    .child(Element::paragraph().text("one"))
                    .child(Element::paragraph().text("two")),
            )
            .child(Element::paragraph().text("three"));
        let doc = Document::new(root);
        let paras = paragraphs(&doc);

        let starts: Vec<_> = paras.iter().map(|p| (p.start, p.end)).collect();
        assert_eq!(starts, vec![(0, 4), (4, 8), (8, 14)]);
        assert_eq!(paras[1].path.as_slice(), &[1, 1]);
        assert!(paras[2].contains(8));
        assert!(!paras[2].contains(14));
    }
}
