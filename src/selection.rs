//! Selection-to-span conversion
//!
//! Turns a (possibly multi-range) selection into canonical spans plus the
//! ranges that wrap them. Boundaries are normalized through the offset
//! index, so every span starts inside the text run holding its first
//! character and ends inside the run holding its last one.

use serde::{Deserialize, Serialize};

use crate::node::{Document, DomRange};
use crate::offset::{boundary_offset, OffsetIndex};
use crate::span::Span;

/// A browser-like selection: zero or more ranges
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub ranges: Vec<DomRange>,
}

impl Selection {
    /// Empty selection (a click without a drag)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Single-range selection
    pub fn single(range: DomRange) -> Self {
        Self { ranges: vec![range] }
    }

    /// Selection covering an offset span of the document
    pub fn from_span(doc: &Document, span: Span) -> Option<Self> {
        OffsetIndex::build(doc).locate_span(span).map(Self::single)
    }

    /// Add a range (builder)
    pub fn with_range(mut self, range: DomRange) -> Self {
        self.ranges.push(range);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// One canonical span and the range that wraps it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedSpan {
    pub span: Span,
    #[serde(skip)]
    pub range: DomRange,
}

/// Compute canonical spans from a selection
///
/// - dangling and empty ranges are dropped, as are ranges covering only
///   chrome (a click from a label's end onto its delete button)
/// - ranges whose spans touch or overlap are merged into one group
/// - each group yields one span, with its boundaries snapped
pub fn compute_spans(doc: &Document, selection: &Selection) -> Vec<SelectedSpan> {
    let mut spans: Vec<Span> = selection
        .ranges
        .iter()
        .filter_map(|range| {
            let (Some(start), Some(end)) =
                (boundary_offset(doc, &range.start), boundary_offset(doc, &range.end))
            else {
                tracing::trace!(%range, "dropping dangling range");
                return None;
            };
            let span = Span::new(start, end);
            (!span.is_empty()).then_some(span)
        })
        .collect();

    if spans.is_empty() {
        return Vec::new();
    }

    spans.sort();
    let mut groups: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        match groups.last_mut() {
            Some(last) if span.start <= last.end => *last = last.union(&span),
            _ => groups.push(span),
        }
    }

    let index = OffsetIndex::build(doc);
    groups
        .into_iter()
        .filter_map(|span| {
            let range = index.locate_span(span)?;
            tracing::trace!(%span, %range, "snapped selection");
            Some(SelectedSpan { span, range })
        })
        .collect()
}
