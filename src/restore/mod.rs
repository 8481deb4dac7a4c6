//! Restoration of submitted annotations
//!
//! Rebuilds a submitted batch on freshly loaded content in two phases:
//!
//! ```text
//! span labels ──► RestorePlan (pure, offsets only) ──► replay (wraps labels)
//! text labels ──► FormState::select_marker
//! non-unit    ──► FormState::restore
//! ```
//!
//! Restoration is best-effort. A span that cannot be placed is logged as a
//! "Restoration Error" and recorded in the [`RestoreReport`]; the pass
//! continues with the next span. A report with errors should be surfaced
//! once to the user (see [`warn_if_likely_wrong`]).

mod plan;
mod replay;

use thiserror::Error;

pub use plan::{PlanNode, RestorePlan};
pub use replay::{replay, Restored};

use crate::error::RestoreError;
use crate::form::FormState;
use crate::marker::{MarkerSet, Scope};
use crate::protocol::{NonUnitMarker, TextLabel};
use crate::restrict::Prompt;

/// Message shown when a restored batch may not match what was submitted
pub const LIKELY_WRONG_MESSAGE: &str = "Some annotations could not be restored exactly. \
     Do not submit edits for this batch; flag it instead.";

// =============================================================================
// Report
// =============================================================================

/// Outcome of one restoration pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{} restoration error(s):\n{}", self.errors.len(), format_errors(&self.errors))]
pub struct RestoreReport {
    /// Labels and values placed
    pub restored: usize,
    /// Per-item failures, in replay order
    pub errors: Vec<RestoreError>,
}

fn format_errors(errors: &[RestoreError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

impl RestoreReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of likely errors
    pub fn likely_errors(&self) -> usize {
        self.errors.len()
    }

    /// Check if everything was restored exactly
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn push(&mut self, error: RestoreError) {
        self.errors.push(error);
    }

    pub fn iter(&self) -> impl Iterator<Item = &RestoreError> {
        self.errors.iter()
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: RestoreReport) {
        self.restored += other.restored;
        self.errors.extend(other.errors);
    }
}

impl IntoIterator for RestoreReport {
    type Item = RestoreError;
    type IntoIter = std::vec::IntoIter<RestoreError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a RestoreReport {
    type Item = &'a RestoreError;
    type IntoIter = std::slice::Iter<'a, RestoreError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// Alert the user once if the report has errors
pub fn warn_if_likely_wrong(report: &RestoreReport, prompt: &mut dyn Prompt) {
    if !report.is_clean() {
        tracing::warn!(errors = report.likely_errors(), "restored batch may be inaccurate");
        prompt.alert(LIKELY_WRONG_MESSAGE);
    }
}

// =============================================================================
// Form values
// =============================================================================

/// Select the text-scope markers of a batch
///
/// Labels undone on the server stay unselected.
pub fn restore_text_markers(form: &mut FormState, markers: &MarkerSet, labels: &[TextLabel]) -> RestoreReport {
    let mut report = RestoreReport::new();
    for label in labels {
        let code = &label.marker.code;
        match markers.resolve(code) {
            Some(marker) if marker.scope == Scope::Text => {
                if label.undone {
                    tracing::debug!(marker = %code, "skipping undone text marker");
                    continue;
                }
                form.select_marker(&marker.code, label.hash.as_deref());
                report.restored += 1;
            }
            _ => {
                let error = RestoreError::UnknownField(code.to_string());
                tracing::warn!(%error, "Restoration Error");
                report.push(error);
            }
        }
    }
    report
}

/// Fill free-text, number, range, radio and checkbox inputs
pub fn restore_non_unit_markers(form: &mut FormState, markers: &[NonUnitMarker], separator: &str) -> RestoreReport {
    let mut report = RestoreReport::new();
    for marker in markers {
        let code = &marker.marker.code;
        if form.restore(code, &marker.content, marker.hash.as_deref(), separator) {
            report.restored += 1;
        } else {
            let error = RestoreError::UnknownField(code.to_string());
            tracing::warn!(%error, "Restoration Error");
            report.push(error);
        }
    }
    report
}

// =============================================================================
// Parallel
// =============================================================================

/// Restore span labels onto many independent documents
///
/// Each document gets label ids from 1. Documents share no state, so the
/// jobs run on the rayon pool.
#[cfg(feature = "parallel")]
pub fn restore_many(
    jobs: Vec<(crate::node::Document, Vec<crate::protocol::SpanLabel>)>,
    markers: &MarkerSet,
) -> Vec<(crate::node::Document, RestoreReport)> {
    use rayon::prelude::*;

    jobs.into_par_iter()
        .map(|(mut doc, labels)| {
            let mut next = crate::id::LabelId::from_raw(1);
            let report = replay(&mut doc, markers, &labels, &mut next, |_| {});
            (doc, report)
        })
        .collect()
}
