//! Wrapping a span in a new label element
//!
//! Wrapping runs as an explicit state machine over one span:
//!
//! 1. Resolve the span to a range, splitting text nodes at both ends so
//!    the boundaries become child indexes.
//! 2. [`try_direct_wrap`]: both boundaries share a parent and no block lies
//!    in between, so the children move into the label as they are.
//! 3. On [`BoundaryConflict`], [`repair_boundaries`] walks each boundary out
//!    of labels and inline elements it sits at the edge of.
//! 4. Blocks in the way are fused (see [`fuse_blocks`]) and the pass restarts.
//! 5. Whatever still straddles element boundaries is split the way DOM
//!    `extractContents` splits it: partially selected elements are cloned
//!    as shells, so a crossed label ends up as two fragments with one id.
//!
//! Every step preserves the logical text, so the span's offsets stay valid
//! across passes.

use crate::error::LabelError;
use crate::node::{common_prefix, Boundary, Children, Document, DomRange, Element, Node, NodePath};
use crate::offset::{node_length, OffsetIndex};
use crate::span::Span;

/// Upper bound on resolve/fuse passes for one span
const MAX_PASSES: usize = 16;

/// A range that cannot be wrapped directly, with the label handed back
#[derive(Debug)]
pub struct BoundaryConflict {
    pub range: DomRange,
    pub label: Element,
}

/// Wrap the characters of `span` in `label`, returning the label's path
pub fn wrap_span(doc: &mut Document, span: Span, label: Element) -> Result<NodePath, LabelError> {
    if span.is_empty() {
        return Err(LabelError::unresolvable(span, "empty span"));
    }

    let mut label = label;
    for pass in 0..MAX_PASSES {
        let range = OffsetIndex::build(doc)
            .locate_span(span)
            .ok_or_else(|| LabelError::unresolvable(span, "offset outside the document"))?;
        let range = split_boundaries(doc, range)
            .ok_or_else(|| LabelError::unresolvable(span, "dangling boundary"))?;

        let conflict = match try_direct_wrap(doc, range, label) {
            Ok(path) => return Ok(path),
            Err(conflict) => conflict,
        };
        let range = repair_boundaries(doc, conflict.range);
        label = conflict.label;
        tracing::trace!(%span, %range, pass, "repaired wrap boundaries");

        if let Some(site) = structural_site(doc, &range)
            && fuse_blocks(doc, &site)
        {
            tracing::debug!(%span, parent = ?site.parent.as_slice(), "fused blocks for multi-paragraph label");
            continue;
        }

        return match try_direct_wrap(doc, range, label) {
            Ok(path) => Ok(path),
            Err(conflict) => extract_and_insert(doc, conflict.range, conflict.label)
                .ok_or_else(|| LabelError::unresolvable(span, "cannot extract range contents")),
        };
    }
    Err(LabelError::unresolvable(span, "too many block boundaries"))
}

// =============================================================================
// Boundary resolution
// =============================================================================

/// Turn text-offset boundaries into child-index boundaries by splitting text
///
/// The end is split first: inserting after the end never moves the start.
fn split_boundaries(doc: &mut Document, range: DomRange) -> Option<DomRange> {
    let (end, _) = split_at_boundary(doc, range.end)?;
    let (start, inserted) = split_at_boundary(doc, range.start)?;
    let mut end = end;
    if let Some((parent, index)) = inserted {
        shift_for_insert(&mut end, &parent, index);
    }
    Some(DomRange::new(start, end))
}

/// Split the text node a boundary points into, returning the boundary in
/// the parent and the position of an inserted node, if any
fn split_at_boundary(doc: &mut Document, boundary: Boundary) -> Option<(Boundary, Option<(NodePath, usize)>)> {
    let Some((&index, parent)) = boundary.path.split_last() else {
        return Some((boundary, None));
    };
    let parent = NodePath::from_slice(parent);
    let container = doc.element_at_mut(&parent)?;
    let Some(Node::Text(text)) = container.children.get_mut(index) else {
        // Element container: already a child index
        return doc.element_at(&boundary.path).map(|_| (boundary, None));
    };

    let len = text.len();
    if boundary.offset == 0 {
        return Some((Boundary::new(&parent, index), None));
    }
    if boundary.offset >= len {
        return Some((Boundary::new(&parent, index + 1), None));
    }
    let tail = text.split_off(boundary.offset);
    container.children.insert(index + 1, Node::Text(tail));
    Some((Boundary::new(&parent, index + 1), Some((parent, index + 1))))
}

/// Adjust a boundary for a node inserted at `parent[index]`
fn shift_for_insert(boundary: &mut Boundary, parent: &[usize], index: usize) {
    let depth = parent.len();
    if boundary.path.as_slice() == parent {
        if boundary.offset >= index {
            boundary.offset += 1;
        }
    } else if boundary.path.len() > depth && boundary.path.starts_with(parent) && boundary.path[depth] >= index {
        boundary.path[depth] += 1;
    }
}

// =============================================================================
// Direct wrap
// =============================================================================

/// Wrap the children between two boundaries of the same parent
///
/// Fails when the boundaries have different parents, the range is empty,
/// or a block would end up inside the label.
pub fn try_direct_wrap(doc: &mut Document, range: DomRange, mut label: Element) -> Result<NodePath, BoundaryConflict> {
    let (start, end) = (range.start.offset, range.end.offset);
    let parent = if range.start.path == range.end.path && start < end {
        doc.element_at_mut(&range.start.path)
    } else {
        None
    };
    let Some(parent) = parent.filter(|p| {
        end <= p.children.len()
            && !p.children[start..end]
                .iter()
                .any(|n| n.kind().is_some_and(|k| k.is_structural()))
    }) else {
        return Err(BoundaryConflict { range, label });
    };

    label.children.extend(parent.children.drain(start..end));
    parent.children.insert(start, Node::element(label));
    let mut path = range.start.path;
    path.push(start);
    Ok(path)
}

// =============================================================================
// Boundary repair
// =============================================================================

/// Walk boundaries out of labels and inline elements they sit at the edge of
///
/// The end moves past its container while only zero-length nodes (delete
/// buttons, badges) follow it; the start moves before its container while
/// only zero-length nodes precede it. Neither walks out of the common
/// ancestor or through a block.
pub fn repair_boundaries(doc: &Document, range: DomRange) -> DomRange {
    let DomRange { mut start, mut end } = range;

    loop {
        let common = common_prefix(&start.path, &end.path).len();
        if end.path.len() > common && at_edge(doc, &end, Edge::End)
            && let Some(after) = Boundary::after(&end.path)
        {
            end = after;
            continue;
        }
        if start.path.len() > common && at_edge(doc, &start, Edge::Start)
            && let Some(before) = Boundary::before(&start.path)
        {
            start = before;
            continue;
        }
        break;
    }
    DomRange::new(start, end)
}

#[derive(Clone, Copy)]
enum Edge {
    Start,
    End,
}

fn at_edge(doc: &Document, boundary: &Boundary, edge: Edge) -> bool {
    let Some(container) = doc.element_at(&boundary.path) else {
        return false;
    };
    if !(container.kind.is_label() || container.kind.is_inline()) {
        return false;
    }
    let children = &container.children;
    let offset = boundary.offset.min(children.len());
    let rest = match edge {
        Edge::Start => &children[..offset],
        Edge::End => &children[offset..],
    };
    rest.iter().all(|n| node_length(n) == 0)
}

// =============================================================================
// Block fusion
// =============================================================================

/// Run of children of `parent` that a range covers and that holds blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuseSite {
    pub parent: NodePath,
    /// First covered child
    pub from: usize,
    /// Last covered child
    pub to: usize,
    /// The range ends inside `to` rather than after it
    pub end_inside: bool,
}

/// Find the structural children a range covers at its common ancestor
fn structural_site(doc: &Document, range: &DomRange) -> Option<FuseSite> {
    let parent = common_prefix(&range.start.path, &range.end.path);
    let depth = parent.len();
    let from = if range.start.path.len() == depth {
        range.start.offset
    } else {
        range.start.path[depth]
    };
    let (to, end_inside) = if range.end.path.len() == depth {
        (range.end.offset.checked_sub(1)?, false)
    } else {
        (range.end.path[depth], true)
    };
    if from > to {
        return None;
    }
    let container = doc.element_at(&parent)?;
    let covered = container.children.get(from..=to)?;
    covered
        .iter()
        .any(|n| n.kind().is_some_and(|k| k.is_structural()))
        .then_some(FuseSite { parent, from, to, end_inside })
}

/// Fuse the covered children into one block, keeping the logical text
///
/// Each implied newline inside the run (after a block, before a list or
/// blockquote) becomes a paragraph-break `<br>`, and containers and
/// scrollable wrappers are spliced in place. When the range ends inside a
/// trailing block, everything is fused into a single block that keeps the
/// trailing newline. Returns `false` when nothing would change.
pub fn fuse_blocks(doc: &mut Document, site: &FuseSite) -> bool {
    let Some(container) = doc.element_at_mut(&site.parent) else {
        return false;
    };
    let single_kept = site.from == site.to
        && site.end_inside
        && container
            .children
            .get(site.from)
            .and_then(Node::kind)
            .is_some_and(|k| k.is_block());
    if single_kept || site.from > site.to || site.to >= container.children.len() {
        return false;
    }

    let items: Vec<Node> = container.children.drain(site.from..=site.to).collect();
    let keep_last = site.end_inside && items.last().and_then(Node::kind).is_some_and(|k| k.is_block());
    let fused = if keep_last {
        let mut items = items;
        let mut last = match items.pop() {
            Some(Node::Element(last)) => last,
            _ => return false,
        };
        let mut block = items
            .iter()
            .find_map(|n| n.as_element().filter(|e| e.kind.is_block()))
            .map_or_else(|| last.shell(), |first| first.shell());
        let mut flat = flatten(items);
        flat.extend(std::mem::take(&mut last.children));
        block.children = flat;
        let mut out = Children::new();
        out.push(Node::element(block));
        out
    } else {
        flatten(items)
    };

    for (offset, node) in fused.into_iter().enumerate() {
        container.children.insert(site.from + offset, node);
    }
    true
}

/// Splice structural nodes into their children, implied newlines becoming
/// paragraph breaks
fn flatten(items: Vec<Node>) -> Children {
    let mut out = Children::new();
    for node in items {
        match node {
            Node::Element(e) if e.kind.is_structural() => {
                for _ in 0..e.kind.leading_newlines() {
                    out.push(Node::element(Element::line_break(true)));
                }
                let trailing = e.kind.trailing_newlines();
                out.extend(e.children);
                for _ in 0..trailing {
                    out.push(Node::element(Element::line_break(true)));
                }
            }
            other => out.push(other),
        }
    }
    out
}

// =============================================================================
// Extraction
// =============================================================================

/// Move the range contents into `label`, splitting partially selected
/// elements into shells, and insert the label at the range start
fn extract_and_insert(doc: &mut Document, range: DomRange, mut label: Element) -> Option<NodePath> {
    let common = common_prefix(&range.start.path, &range.end.path);
    let depth = common.len();
    let container = doc.element_at_mut(&common)?;

    let (partial_start, first_full) = if range.start.path.len() == depth {
        (None, range.start.offset)
    } else {
        let si = range.start.path[depth];
        (Some(si), si + 1)
    };
    let (partial_end, end_full) = if range.end.path.len() == depth {
        (None, range.end.offset)
    } else {
        (Some(range.end.path[depth]), range.end.path[depth])
    };
    if first_full > end_full || end_full > container.children.len() {
        return None;
    }

    let left = match partial_end {
        Some(ei) => {
            let child = container.children.get_mut(ei)?.as_element_mut()?;
            Some(split_left(child, &range.end.path[depth + 1..], range.end.offset))
        }
        None => None,
    };
    let right = match partial_start {
        Some(si) => {
            let child = container.children.get_mut(si)?.as_element_mut()?;
            Some(split_right(child, &range.start.path[depth + 1..], range.start.offset))
        }
        None => None,
    };
    let middle: Vec<Node> = container.children.drain(first_full..end_full).collect();

    if let Some(right) = right.filter(|e| !e.is_empty()) {
        label.push_elem(right);
    }
    label.children.extend(middle);
    if let Some(left) = left.filter(|e| !e.is_empty()) {
        label.push_elem(left);
    }
    container.children.insert(first_full, Node::element(label));

    let mut path = common;
    path.push(first_full);
    Some(path)
}

/// Detach everything after the boundary `(rel, offset)` into a shell of `elem`
fn split_right(elem: &mut Element, rel: &[usize], offset: usize) -> Element {
    let mut right = elem.shell();
    match rel.split_first() {
        None => {
            let at = offset.min(elem.children.len());
            right.children.extend(elem.children.drain(at..));
        }
        Some((&i, rest)) => {
            let tail: Vec<Node> = elem.children.drain((i + 1).min(elem.children.len())..).collect();
            if let Some(child) = elem.children.get_mut(i).and_then(Node::as_element_mut) {
                let inner = split_right(child, rest, offset);
                if !inner.is_empty() {
                    right.push_elem(inner);
                }
            }
            right.children.extend(tail);
        }
    }
    right
}

/// Detach everything before the boundary `(rel, offset)` into a shell of `elem`
fn split_left(elem: &mut Element, rel: &[usize], offset: usize) -> Element {
    let mut left = elem.shell();
    match rel.split_first() {
        None => {
            let at = offset.min(elem.children.len());
            left.children.extend(elem.children.drain(..at));
        }
        Some((&i, rest)) => {
            let at = i.min(elem.children.len());
            left.children.extend(elem.children.drain(..at));
            if let Some(child) = elem.children.get_mut(0).and_then(Node::as_element_mut) {
                let inner = split_left(child, rest, offset);
                if !inner.is_empty() {
                    left.push_elem(inner);
                }
            }
        }
    }
    left
}
