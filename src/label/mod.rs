//! Label mutation engine
//!
//! - `wrap`: wraps a span in a label element, repairing boundaries that
//!   straddle existing labels and fusing blocks for multi-paragraph spans
//! - `delete`: unwraps a label and merges the freed content with its neighbors
//! - `nesting`: recomputes the stacking style of nested labels
//!
//! This module also owns the chrome pass ([`decorate`]): delete buttons and
//! relation badges are derived state, stripped and re-added after every
//! mutation so no operation has to keep them in sync by hand.

pub mod delete;
pub mod nesting;
pub mod wrap;

use compact_str::CompactString;
use rustc_hash::FxHashMap;

pub use delete::{merge_neighbors, unwrap_label};
pub use nesting::restyle;
pub use wrap::{fuse_blocks, repair_boundaries, try_direct_wrap, wrap_span, BoundaryConflict, FuseSite};

use crate::error::LabelError;
use crate::id::LabelId;
use crate::marker::Marker;
use crate::node::{Document, Element, LabelData, Node, NodePath};
use crate::span::Span;

/// Label data for a new label of `marker`, carrying the marker's hash if it has one
pub fn label_data(id: LabelId, marker: &Marker) -> LabelData {
    let mut data = LabelData::new(id, marker.code.clone())
        .with_colors(marker.color.clone(), marker.text_color.clone());
    data.hash = marker.hash.clone();
    data
}

/// Wrap `span` in a new label and check that it covers exactly the span
///
/// Returns the path of the label's first fragment.
pub fn mark_span(doc: &mut Document, span: Span, data: LabelData) -> Result<NodePath, LabelError> {
    let id = data.id;
    let path = wrap_span(doc, span, Element::label(data))?;

    let length = doc.label_length(id);
    if length != span.len() {
        tracing::warn!(label = %id, %span, length, "label length differs from its span");
    }
    tracing::debug!(label = %id, %span, "marked span");
    Ok(path)
}

// =============================================================================
// Chrome
// =============================================================================

/// Re-derive delete buttons and relation badges
///
/// Chrome goes on the last fragment of each label: the badge (relation
/// number or `+`) followed by the delete button. Disabled labels never get
/// a delete button.
pub fn decorate(doc: &mut Document, badges: &FxHashMap<LabelId, CompactString>, delete_buttons: bool) {
    doc.for_each_element_mut(|elem| {
        if elem.kind.is_label() {
            elem.children.retain(|n| !n.kind().is_some_and(|k| k.is_chrome()));
        }
    });

    for id in doc.label_ids() {
        let Some(last) = doc.label_paths(id).pop() else {
            continue;
        };
        let Some(label) = doc.element_at_mut(&last) else {
            continue;
        };
        if let Some(badge) = badges.get(&id) {
            label.push_elem(Element::badge(badge.as_str()));
        }
        let disabled = label.label_data().is_some_and(|d| d.disabled);
        if delete_buttons && !disabled {
            label.push_elem(Element::delete_button());
        }
    }
}

/// Remove all chrome, leaving only annotated content
pub fn strip_chrome(elem: &mut Element) {
    elem.children.retain(|n| !n.kind().is_some_and(|k| k.is_chrome()));
    for child in elem.children.iter_mut() {
        if let Node::Element(e) = child {
            strip_chrome(e);
        }
    }
}
