//! Replaying span labels onto a document
//!
//! Phase two of restoration: walk the [`RestorePlan`] and wrap each span.
//! Wrapping never changes the plain text, so every span's stored offsets
//! stay valid no matter how many labels were placed before it. Failures
//! are logged as restoration errors and skipped.
//!
//! A placed label is checked twice: its length against the span, and its
//! logical text against the document text the span selected beforehand.
//! Markup whose newlines are counted differently shows up as the second.

use compact_str::CompactString;

use super::{RestorePlan, RestoreReport};
use crate::error::{LabelError, RestoreError};
use crate::id::LabelId;
use crate::label::{label_data, mark_span};
use crate::marker::MarkerSet;
use crate::node::Document;
use crate::protocol::SpanLabel;
use crate::selection::{compute_spans, Selection};
use crate::span::Span;

/// A label placed by [`replay`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
    /// Index into the replayed slice
    pub index: usize,
    pub id: LabelId,
    pub span: Span,
    /// Marker code of the configured marker
    pub marker: CompactString,
    /// Label text content
    pub text: String,
    pub hash: Option<String>,
    pub undone: bool,
}

/// Wrap every span label, assigning ids from `next_id`
///
/// `on_restored` runs once per placed label, in replay order. A label
/// placed with the wrong length or text is still reported to `on_restored`
/// and also counted as an error.
pub fn replay<F>(
    doc: &mut Document,
    markers: &MarkerSet,
    labels: &[SpanLabel],
    next_id: &mut LabelId,
    mut on_restored: F,
) -> RestoreReport
where
    F: FnMut(Restored),
{
    let spans: Vec<Span> = labels.iter().map(SpanLabel::span).collect();
    let plan = RestorePlan::build(&spans);
    let mut report = RestoreReport::new();

    for &(a, b) in plan.crossing() {
        tracing::debug!(first = %spans[a], second = %spans[b], "restoring crossing labels");
    }

    for node in plan.nodes() {
        let label = &labels[node.index];
        let expected = span_text(doc, node.span);
        match restore_one(doc, markers, label, *next_id) {
            Ok(mut restored) => {
                *next_id = next_id.next();
                restored.index = node.index;
                if let Some(error) = check_placed(doc, restored.id, node.span, expected) {
                    tracing::warn!(%error, "Restoration Error");
                    report.push(error);
                }
                report.restored += 1;
                on_restored(restored);
            }
            Err(error) => {
                tracing::warn!(%error, depth = node.depth, "Restoration Error");
                report.push(error);
            }
        }
    }

    tracing::debug!(restored = report.restored, errors = report.len(), "replayed span labels");
    report
}

/// Logical text under a span
fn span_text(doc: &Document, span: Span) -> String {
    doc.plain_text().chars().skip(span.start).take(span.len()).collect()
}

fn check_placed(doc: &Document, id: LabelId, span: Span, expected: String) -> Option<RestoreError> {
    let actual = doc.label_length(id);
    if actual != span.len() {
        return Some(RestoreError::LengthMismatch { span, actual });
    }
    let actual = doc.label_plain_text(id);
    (actual != expected).then_some(RestoreError::TextMismatch { span, expected, actual })
}

/// Place one label with id `id`
fn restore_one(
    doc: &mut Document,
    markers: &MarkerSet,
    label: &SpanLabel,
    id: LabelId,
) -> Result<Restored, RestoreError> {
    let span = label.span();
    if span.is_empty() {
        return Err(RestoreError::Empty { span });
    }
    let len = doc.len();
    if span.end > len {
        return Err(RestoreError::OutOfRange { span, len });
    }
    let marker = markers.resolve(&label.marker.code).ok_or_else(|| RestoreError::UnknownMarker {
        span,
        code: label.marker.code.to_string(),
    })?;

    let selection = Selection::from_span(doc, span)
        .ok_or_else(|| LabelError::unresolvable(span, "no text run at the span boundaries"))?;
    let selected = compute_spans(doc, &selection);
    let [selected] = selected.as_slice() else {
        return Err(LabelError::unresolvable(span, "selection does not resolve to one span").into());
    };
    if selected.span != span {
        return Err(LabelError::unresolvable(span, format!("selection snapped to {}", selected.span)).into());
    }

    let mut data = label_data(id, marker);
    data.hash = label.hash.clone();
    data.disabled = label.undone;
    mark_span(doc, span, data)?;

    Ok(Restored {
        index: 0,
        id,
        span,
        marker: marker.code.clone(),
        text: doc.label_text(id),
        hash: label.hash.clone(),
        undone: label.undone,
    })
}
