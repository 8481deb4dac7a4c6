//! Error types for textinator-core.
//!
//! One enum per concern, folded into [`TextinatorError`] for callers that
//! do not care which layer failed. Every variant is recoverable: a failed
//! operation leaves the session unchanged.

use thiserror::Error;

use crate::id::{LabelId, RelationId};
use crate::protocol::RequestKind;
use crate::span::Span;

// =============================================================================
// Label errors
// =============================================================================

/// Errors from marking and deleting labels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    /// No unmarked chunk is waiting for a marker
    #[error("nothing is selected")]
    NoPendingSelection,

    /// The marker's per-input maximum has been reached
    #[error("marker {marker} allows at most {max} labels")]
    MarkerLimit {
        /// Marker code
        marker: String,
        /// Configured maximum
        max: usize,
    },

    /// The marker code is not configured on this page
    #[error("unknown marker: {0}")]
    UnknownMarker(String),

    /// Text-scope markers label an input as a whole, not a span
    #[error("marker {0} cannot label a span")]
    NotSpanScope(String),

    /// No label element or chunk carries this id
    #[error("unknown label: {0}")]
    UnknownLabel(LabelId),

    /// A span could not be resolved to boundaries in the document
    #[error("cannot resolve span {span}: {reason}")]
    Unresolvable {
        /// The span that failed
        span: Span,
        /// Which boundary rule failed
        reason: String,
    },
}

impl LabelError {
    /// Create an unresolvable-span error.
    pub fn unresolvable(span: Span, reason: impl Into<String>) -> Self {
        Self::Unresolvable {
            span,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Relation errors
// =============================================================================

/// Errors from building, changing and removing relations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelationError {
    /// A relation needs at least two active labels
    #[error("select at least two labels to form a relation (got {count})")]
    TooFewLabels {
        /// Number of active labels
        count: usize,
    },

    /// The active labels already form exactly this relation
    #[error("these labels already form relation {0}")]
    Duplicate(RelationId),

    /// No active label pair matches the rule
    #[error("no valid pair of labels for rule {rule}")]
    NoEdges {
        /// Rule identifier
        rule: String,
    },

    /// Source and destination relations connect different marker pairs
    #[error("cannot move a label between relations of different types ({from} -> {to})")]
    CrossType {
        /// Source relation
        from: RelationId,
        /// Destination relation
        to: RelationId,
    },

    /// No relation with this id exists
    #[error("unknown relation: {0}")]
    UnknownRelation(RelationId),

    /// No rule with this identifier is configured
    #[error("unknown relation rule: {0}")]
    UnknownRule(String),

    /// The label is not a member of the relation
    #[error("label {label} is not part of relation {relation}")]
    NotMember {
        /// The label
        label: LabelId,
        /// The relation
        relation: RelationId,
    },
}

// =============================================================================
// Restriction errors
// =============================================================================

/// Blocking failures of the pre-action checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestrictionError {
    /// A strict count restriction is not met
    #[error("marker {marker} requires {requirement} (currently {count})")]
    Unmet {
        /// Marker code
        marker: String,
        /// Human-readable requirement, e.g. `at least 2`
        requirement: String,
        /// Current count
        count: usize,
    },

    /// A required radio group or text field is empty
    #[error("required field is empty: {0}")]
    RequiredField(String),

    /// The user declined to proceed past an informational restriction
    #[error("cancelled by user")]
    Declined,
}

// =============================================================================
// Session errors
// =============================================================================

/// Errors from the session request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A request is pending; mutations would race with its response
    #[error("a {0} request is in flight")]
    RequestInFlight(RequestKind),

    /// The ticket does not belong to the pending request
    #[error("stale request ticket")]
    StaleTicket,

    /// The server reported an error
    #[error("server rejected the {0} request")]
    Server(RequestKind),
}

// =============================================================================
// Conversion errors
// =============================================================================

/// Errors from parsing HTML into a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// The tokenizer failed
    #[error("malformed HTML at byte {position}: {message}")]
    Malformed {
        /// Byte position in the input
        position: u64,
        /// Tokenizer message
        message: String,
    },

    /// Non-UTF-8 content
    #[error("invalid UTF-8 in HTML input")]
    Encoding,
}

// =============================================================================
// Restoration errors
// =============================================================================

/// A span or value that could not be restored.
///
/// Restoration never stops at one of these: the span is skipped (or kept
/// with a warning) and the error lands in the report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestoreError {
    /// Start and end coincide
    #[error("span {span} is empty")]
    Empty {
        /// The span
        span: Span,
    },

    /// The span ends past the document
    #[error("span {span} exceeds the document length {len}")]
    OutOfRange {
        /// The span
        span: Span,
        /// Document length
        len: usize,
    },

    /// The marker code is not configured on this page
    #[error("unknown marker {code} for span {span}")]
    UnknownMarker {
        /// The span
        span: Span,
        /// Marker code
        code: String,
    },

    /// The restored label does not cover the span exactly
    #[error("label for span {span} covers {actual} characters")]
    LengthMismatch {
        /// The span
        span: Span,
        /// Label length after wrapping
        actual: usize,
    },

    /// The restored label covers other characters than the span
    #[error("label for span {span} reads {actual:?}, expected {expected:?}")]
    TextMismatch {
        /// The span
        span: Span,
        /// Document text under the span before wrapping
        expected: String,
        /// Label text after wrapping
        actual: String,
    },

    /// No input control carries this marker code
    #[error("no input for marker {0}")]
    UnknownField(String),

    /// Wrapping failed
    #[error(transparent)]
    Label(#[from] LabelError),
}

impl RestoreError {
    /// Span the error refers to, if any
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Empty { span }
            | Self::OutOfRange { span, .. }
            | Self::UnknownMarker { span, .. }
            | Self::LengthMismatch { span, .. }
            | Self::TextMismatch { span, .. } => Some(*span),
            Self::Label(LabelError::Unresolvable { span, .. }) => Some(*span),
            Self::UnknownField(_) | Self::Label(_) => None,
        }
    }
}

// =============================================================================
// Crate error
// =============================================================================

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum TextinatorError {
    #[error(transparent)]
    Label(#[from] LabelError),

    #[error(transparent)]
    Relation(#[from] RelationError),

    #[error(transparent)]
    Restriction(#[from] RestrictionError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Restore(#[from] RestoreError),

    /// Payload (de)serialization failed
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for textinator operations.
pub type Result<T> = std::result::Result<T, TextinatorError>;

impl TextinatorError {
    /// Message suitable for a blocking alert
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Check if the action was refused because a request is pending
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Session(SessionError::RequestInFlight(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LabelError::MarkerLimit { marker: "PER".into(), max: 2 };
        assert_eq!(err.to_string(), "marker PER allows at most 2 labels");

        let err = RelationError::CrossType {
            from: RelationId::from_raw(1),
            to: RelationId::from_raw(3),
        };
        assert_eq!(
            err.to_string(),
            "cannot move a label between relations of different types (1 -> 3)"
        );

        let err: TextinatorError = SessionError::RequestInFlight(RequestKind::Submit).into();
        assert!(err.is_in_flight());
        assert_eq!(err.to_string(), "a submit request is in flight");
    }

    #[test]
    fn test_restore_error_span() {
        let span = Span::new(3, 9);
        assert_eq!(RestoreError::Empty { span }.span(), Some(span));
        let err: RestoreError = LabelError::unresolvable(span, "no text run").into();
        assert_eq!(err.span(), Some(span));
        assert_eq!(err.to_string(), "cannot resolve span [3, 9): no text run");
        assert_eq!(RestoreError::UnknownField("N".into()).span(), None);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TextinatorError>();
    }
}
