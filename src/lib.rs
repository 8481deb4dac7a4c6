//! textinator-core - Span labeling and relation building over a virtual document tree
//!
//! ## Core Concepts
//!
//! **Offset model**: every position in a document is a character offset
//! into its plain text. A paragraph-like block adds one trailing newline,
//! a list or blockquote one leading newline, and chrome (badges, delete
//! buttons) nothing. Labels only wrap text, so offsets survive any number
//! of labels.
//!
//! **Sessions**: a [`Session`] owns one document and everything annotated
//! on it. Requests to the server are modelled as tickets: a pending request
//! blocks every mutation until its response is applied.
//!
//! ## Modules
//! - `node`: Document/Element/Node/Text types and path addressing
//! - `offset`: offset model and offset index
//! - `selection`: canonical spans from user selections
//! - `label`: wrapping, unwrapping, nesting styles, chrome
//! - `relation`: relation building, renumbering and graphs
//! - `restore`: replay of submitted annotations
//! - `convert`: HTML to document
//! - `render`: document to HTML
//! - `session`: the annotation session state machine
//!
//! ## Usage
//!
//! ```ignore
//! use textinator_core::prelude::*;
//!
//! let markers = MarkerSet::new().marker(Marker::new("PER"));
//! let mut session = Session::from_html("<p>Alice met Bob</p>", markers, SessionConfig::REGULAR)?;
//!
//! let selection = Selection::from_span(session.doc(), Span::new(0, 5)).unwrap();
//! session.select(&selection)?;
//! session.mark("PER", &mut LogPrompt)?;
//!
//! let (ticket, request) = session.submit_request(None, &mut LogPrompt)?;
//! ```

#[macro_use]
mod macros;

// =============================================================================
// Document model
// =============================================================================

/// Node types: Document, Element, Node, Text
pub mod node;

/// Attribute types
pub mod attr;

/// Label and relation identifiers
pub mod id;

/// Character spans
pub mod span;

/// Offset model
pub mod offset;

// =============================================================================
// Annotation
// =============================================================================

/// Markers, restrictions and relation rules
pub mod marker;

/// Selections and canonical spans
pub mod selection;

/// Annotated and pending chunks
pub mod chunk;

/// Label wrapping, deletion and nesting
pub mod label;

/// Relations between labels
pub mod relation;

/// Form inputs
pub mod form;

/// Plugins and session events
pub mod plugin;

/// Restriction checks and prompts
pub mod restrict;

/// Restoration of submitted annotations
pub mod restore;

// =============================================================================
// Session and I/O
// =============================================================================

/// Session configuration
pub mod config;

/// Server request and response types
pub mod protocol;

/// Submission payload
pub mod submit;

/// The annotation session
pub mod session;

/// HTML parsing
pub mod convert;

/// HTML rendering
pub mod render;

/// Error types
pub mod error;

/// Prelude for common imports
pub mod prelude;

// =============================================================================
// Re-exports
// =============================================================================

// Node types
pub use node::{Children, Document, Element, ElementKind, LabelData, Node, Text};

// Attribute types
pub use attr::Attrs;

// Identity
pub use id::{ChunkId, LabelId, RelationId, StorageKey};

// Span
pub use span::Span;

// Annotation
pub use chunk::{Chunk, ChunkList};
pub use marker::{Marker, MarkerSet, RelationRule, Restriction};
pub use relation::{Relation, RelationMap, Remap};
pub use selection::Selection;

// Session
pub use config::SessionConfig;
pub use session::{RequestTicket, Session, SharedSession};

// Restoration
pub use restore::RestoreReport;

// Error types
pub use error::{Result, TextinatorError};
