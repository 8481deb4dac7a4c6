//! Wire shapes exchanged with the annotation server
//!
//! The server owns these formats; this module only mirrors them with
//! `serde`. Requests are form-encoded (complex values as JSON strings),
//! responses are JSON.

use std::fmt;

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::Mode;
use crate::span::Span;
use crate::submit::SubmitPayload;

// =============================================================================
// Request kinds
// =============================================================================

/// Kinds of request a session can have in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Submit,
    NewText,
    Skip,
    FinishRound,
    Undo,
    Flag,
    RestoreBatch,
}

impl RequestKind {
    /// Name used in logs and messages
    pub fn name(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::NewText => "new text",
            Self::Skip => "skip",
            Self::FinishRound => "finish round",
            Self::Undo => "undo",
            Self::Flag => "flag",
            Self::RestoreBatch => "restore batch",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Submission
// =============================================================================

/// Pagination and search state sent in edit and review modes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Submission request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitRequest {
    #[serde(flatten)]
    pub payload: SubmitPayload,
    /// Plain-text reconstruction of the document (`textContent`)
    pub context: String,
    pub datasource: u64,
    pub datapoint: u64,
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl SubmitRequest {
    /// Form encoding: scalars as-is, everything else as a JSON string
    pub fn to_form_fields(&self) -> serde_json::Result<Vec<(String, String)>> {
        let payload = &self.payload;
        let mut fields = vec![
            ("relations".to_owned(), serde_json::to_string(&payload.relations)?),
            ("chunks".to_owned(), serde_json::to_string(&payload.chunks)?),
            ("marker_groups".to_owned(), serde_json::to_string(&payload.marker_groups)?),
            ("short_text_markers".to_owned(), serde_json::to_string(&payload.short_text_markers)?),
            ("long_text_markers".to_owned(), serde_json::to_string(&payload.long_text_markers)?),
            ("text_markers".to_owned(), serde_json::to_string(&payload.text_markers)?),
            ("numbers".to_owned(), serde_json::to_string(&payload.numbers)?),
            ("ranges".to_owned(), serde_json::to_string(&payload.ranges)?),
            ("radio".to_owned(), serde_json::to_string(&payload.radio)?),
            ("checkboxes".to_owned(), serde_json::to_string(&payload.checkboxes)?),
            ("context".to_owned(), self.context.clone()),
            ("datasource".to_owned(), self.datasource.to_string()),
            ("datapoint".to_owned(), self.datapoint.to_string()),
            ("mode".to_owned(), self.mode.code().to_owned()),
        ];
        if let Some(pagination) = &self.pagination {
            fields.push(("p".to_owned(), pagination.page.to_string()));
            if let Some(search) = &pagination.search {
                fields.push(("search".to_owned(), search.clone()));
            }
            if let Some(scope) = &pagination.scope {
                fields.push(("scope".to_owned(), scope.clone()));
            }
        }
        Ok(fields)
    }
}

/// Submission response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    /// HTML fragment replacing the board in edit/review modes
    #[serde(default)]
    pub template: Option<String>,
    /// Replace only `<main>` rather than the whole board
    #[serde(default)]
    pub partial: bool,
}

// =============================================================================
// Restoration
// =============================================================================

/// Marker reference inside restored labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRef {
    pub code: CompactString,
}

impl MarkerRef {
    pub fn new(code: impl Into<CompactString>) -> Self {
        Self { code: code.into() }
    }
}

/// A previously submitted span label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanLabel {
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub hash: Option<String>,
    pub marker: MarkerRef,
    /// Undone on the server: restored disabled
    #[serde(default)]
    pub undone: bool,
    /// Plugin name to stored value
    #[serde(default)]
    pub extra: FxHashMap<CompactString, String>,
}

impl SpanLabel {
    /// Create a span label
    pub fn new(start: usize, end: usize, code: impl Into<CompactString>) -> Self {
        Self {
            start,
            end,
            hash: None,
            marker: MarkerRef::new(code),
            undone: false,
            extra: FxHashMap::default(),
        }
    }

    /// Attach the server hash (builder)
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    #[inline]
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

/// A marker selected for the whole input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextLabel {
    pub marker: MarkerRef,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub undone: bool,
}

/// A form value (free text, number, range, radio, checkbox)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonUnitMarker {
    pub marker: MarkerRef,
    pub content: String,
    #[serde(default)]
    pub hash: Option<String>,
}

/// Document and ids of a restored batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreContext {
    pub ds_id: u64,
    pub dp_id: u64,
    /// Raw HTML to install
    pub content: String,
}

/// Restore-batch response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreBatchResponse {
    pub context: RestoreContext,
    #[serde(default)]
    pub non_unit_markers: Vec<NonUnitMarker>,
    #[serde(default)]
    pub text_labels: Vec<TextLabel>,
    #[serde(default)]
    pub span_labels: Vec<SpanLabel>,
}

// =============================================================================
// Other responses
// =============================================================================

/// Undo response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoResponse {
    /// Batches whose chunks become submittable again
    #[serde(default)]
    pub batch: Vec<String>,
    #[serde(default)]
    pub submitted: u64,
    #[serde(default)]
    pub submitted_today: u64,
    #[serde(default)]
    pub input: Option<String>,
}

/// Data point metadata of a new text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPointInfo {
    pub source_id: u64,
    pub id: u64,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub is_empty: bool,
}

/// New-text, skip and finish-round response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTextResponse {
    pub dp_info: DataPointInfo,
    /// HTML of the next text
    #[serde(default)]
    pub text: String,
}

/// Flag-feedback request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagRequest {
    /// Validated feedback fields, JSON-stringified
    pub feedback: String,
    pub ds_id: u64,
    pub dp_id: u64,
}
