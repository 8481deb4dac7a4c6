//! Visual stacking of nested labels
//!
//! A label that encloses `h` levels of labels gets `base + step * h`
//! padding, so every enclosing label shows around the ones inside it. The
//! innermost label of a stack also gets a line height tall enough for the
//! whole stack.

use crate::config::{DisplayType, NestingStyle};
use crate::node::{Document, Element, LabelStyle};

/// Recompute [`LabelStyle`] for every label in the document
pub fn restyle(doc: &mut Document, style: &NestingStyle, display: DisplayType) {
    restyle_element(&mut doc.root, 0, style, display);
}

/// Returns the number of label levels below `elem`
fn restyle_element(elem: &mut Element, depth: usize, style: &NestingStyle, display: DisplayType) -> usize {
    let child_depth = depth + usize::from(elem.kind.is_label());
    let mut height = 0;
    for child in elem.children.iter_mut() {
        if let Some(e) = child.as_element_mut() {
            let below = restyle_element(e, child_depth, style, display);
            height = height.max(if e.kind.is_label() { below + 1 } else { below });
        }
    }

    if let Some(data) = elem.label_data_mut() {
        data.style = LabelStyle {
            depth,
            padding: style.padding(height),
            line_height: (height == 0 && depth > 0).then(|| style.line_height(depth, display)),
        };
    }
    height
}
