//! Prelude module for common imports.
//!
//! ```ignore
//! use textinator_core::prelude::*;
//! ```

// Node types
pub use crate::node::{Boundary, Children, Document, DomRange, Element, ElementKind, LabelData, Node, Text};

// Attributes
pub use crate::attr::Attrs;

// Identity
pub use crate::id::{ChunkId, LabelId, RelationId, StorageKey};

// Span and offsets
pub use crate::offset::{previous_text_length, OffsetIndex};
pub use crate::span::Span;

// Annotation
pub use crate::chunk::{Chunk, ChunkList};
pub use crate::marker::{Direction, Marker, MarkerSet, RelationRule, Restriction, Scope};
pub use crate::relation::{ActiveLabel, Relation, RelationMap, Remap};
pub use crate::selection::{compute_spans, Selection};

// Forms, plugins, prompts
pub use crate::form::{FieldKind, FormField, FormState};
pub use crate::plugin::{CommentPlugin, Event, EventBus, EventKind, Plugin, PluginRegistry, SliderPlugin, Target};
pub use crate::restrict::{LogPrompt, Prompt, RecordingPrompt};

// Session
pub use crate::config::{DisplayType, Layout, Mode, SessionConfig};
pub use crate::protocol::RequestKind;
pub use crate::session::{RequestTicket, Session, SharedSession};

// Restoration
pub use crate::restore::RestoreReport;

// Conversion and rendering
pub use crate::convert::from_html;
pub use crate::render::{render_document, RenderConfig};

// Error
pub use crate::error::{Result, TextinatorError};
