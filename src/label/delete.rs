//! Label deletion and neighbor merging
//!
//! Deleting a label unwraps every fragment in place and then merges the
//! freed content with its neighbors: adjacent text runs join, and label
//! fragments that a crossing span had split apart join back together.

use crate::id::LabelId;
use crate::node::{Children, Document, Element, Node};

/// Unwrap every fragment of label `id`, returning how many were removed
pub fn unwrap_label(doc: &mut Document, id: LabelId) -> usize {
    let paths = doc.label_paths(id);
    // Reverse document order keeps the remaining paths valid
    for path in paths.iter().rev() {
        let Some((&index, parent)) = path.split_last() else {
            continue;
        };
        let Some(container) = doc.element_at_mut(parent) else {
            continue;
        };
        let Node::Element(label) = container.children.remove(index) else {
            continue;
        };
        let freed = label.children.into_iter().filter(|n| !n.kind().is_some_and(|k| k.is_chrome()));
        for (offset, node) in freed.enumerate() {
            container.children.insert(index + offset, node);
        }
    }

    if !paths.is_empty() {
        merge_neighbors(&mut doc.root);
        tracing::debug!(label = %id, fragments = paths.len(), "unwrapped label");
    }
    paths.len()
}

/// Merge adjacent text runs and same-id label fragments, dropping empty text
pub fn merge_neighbors(elem: &mut Element) {
    for child in elem.children.iter_mut() {
        if let Some(e) = child.as_element_mut() {
            merge_neighbors(e);
        }
    }

    let mut merged = Children::new();
    let mut remerge = false;
    for node in elem.children.drain(..) {
        match (merged.last_mut(), node) {
            (_, Node::Text(t)) if t.is_empty() => {}
            (Some(Node::Text(prev)), Node::Text(t)) => prev.content.push_str(&t.content),
            (Some(Node::Element(prev)), Node::Element(next)) if same_label(prev, &next) => {
                prev.children.retain(|n| !n.kind().is_some_and(|k| k.is_chrome()));
                prev.children.extend(next.children);
                remerge = true;
            }
            (_, node) => merged.push(node),
        }
    }
    elem.children = merged;

    if remerge {
        for child in elem.children.iter_mut() {
            if let Some(e) = child.as_element_mut()
                && e.kind.is_label()
            {
                merge_neighbors(e);
            }
        }
    }
}

fn same_label(a: &Element, b: &Element) -> bool {
    matches!((a.label_id(), b.label_id()), (Some(x), Some(y)) if x == y)
}
