//! Chunks: in-memory records of annotated and pending spans
//!
//! The chunk list keeps marked chunks in marking order, followed by the
//! pending tail: the unmarked chunk(s) of the current selection, replaced
//! wholesale on every selection event.

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::id::ChunkId;
use crate::marker::base_code;
use crate::node::DomRange;
use crate::span::Span;

// =============================================================================
// Chunk
// =============================================================================

/// One annotated or pending span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Assigned at mark time; `None` while pending
    pub id: Option<ChunkId>,
    #[serde(flatten)]
    pub span: Span,
    /// Marker code, `None` while pending
    pub label: Option<CompactString>,
    /// Covered text (label text content)
    #[serde(default)]
    pub text: String,
    pub marked: bool,
    pub submittable: bool,
    pub independent: bool,
    /// Plugin name to plugin value
    #[serde(default)]
    pub extra: FxHashMap<CompactString, String>,
    /// Server id of a previously submitted chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Submission batch once submitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    /// Soft-deleted in editing-batch mode
    #[serde(default)]
    pub deleted: bool,
    /// Range to wrap, only meaningful while pending
    #[serde(skip)]
    pub range: Option<DomRange>,
}

impl Chunk {
    /// Create a pending chunk for a selection
    pub fn pending(span: Span, range: DomRange) -> Self {
        Self {
            id: None,
            span,
            label: None,
            text: String::new(),
            marked: false,
            submittable: false,
            independent: false,
            extra: FxHashMap::default(),
            hash: None,
            batch: None,
            deleted: false,
            range: Some(range),
        }
    }

    /// Create a marked, submittable chunk for a label
    pub fn marked(id: ChunkId, span: Span, label: impl Into<CompactString>) -> Self {
        Self {
            id: Some(id),
            label: Some(label.into()),
            marked: true,
            submittable: true,
            range: None,
            ..Self::pending(span, DomRange::default())
        }
    }

    /// Check if this chunk counts as a live label (marked and not deleted)
    #[inline]
    pub fn is_active(&self) -> bool {
        self.marked && !self.deleted
    }

    /// Check if this chunk goes into the next submission
    #[inline]
    pub fn is_submittable(&self) -> bool {
        self.is_active() && self.submittable
    }

    /// Marker base code (variant suffix stripped)
    pub fn base_label(&self) -> Option<&str> {
        self.label.as_deref().map(base_code)
    }
}

// =============================================================================
// ChunkList
// =============================================================================

/// Ordered chunks with a pending tail
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkList {
    chunks: Vec<Chunk>,
}

impl ChunkList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks, pending ones included
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// All chunks in order
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// All chunks in order (mutable)
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.chunks.iter_mut()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pending tail
    // ─────────────────────────────────────────────────────────────────────────

    fn pending_start(&self) -> usize {
        self.chunks.iter().rposition(|c| c.marked).map_or(0, |i| i + 1)
    }

    /// Unmarked chunks of the current selection
    pub fn pending(&self) -> &[Chunk] {
        &self.chunks[self.pending_start()..]
    }

    /// Check if a selection is waiting for a marker
    pub fn has_pending(&self) -> bool {
        self.chunks.last().is_some_and(|c| !c.marked)
    }

    /// Replace the pending tail with a new selection
    pub fn set_pending(&mut self, chunks: impl IntoIterator<Item = Chunk>) {
        self.clear_pending();
        self.chunks.extend(chunks.into_iter().filter(|c| !c.marked));
    }

    /// Drop the pending tail
    pub fn clear_pending(&mut self) {
        let start = self.pending_start();
        self.chunks.truncate(start);
    }

    /// Take the pending tail out of the list
    pub fn take_pending(&mut self) -> Vec<Chunk> {
        let start = self.pending_start();
        self.chunks.split_off(start)
    }

    /// Append a marked chunk before the pending tail
    pub fn push_marked(&mut self, chunk: Chunk) {
        let start = self.pending_start();
        self.chunks.insert(start, chunk);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────────

    /// Chunk by id
    pub fn get(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.id == Some(id))
    }

    /// Chunk by id (mutable)
    pub fn get_mut(&mut self, id: ChunkId) -> Option<&mut Chunk> {
        self.chunks.iter_mut().find(|c| c.id == Some(id))
    }

    /// Remove a chunk by id
    pub fn remove(&mut self, id: ChunkId) -> Option<Chunk> {
        let pos = self.chunks.iter().position(|c| c.id == Some(id))?;
        Some(self.chunks.remove(pos))
    }

    /// Marked, non-deleted chunks
    pub fn active(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().filter(|c| c.is_active())
    }

    /// Chunks eligible for the next submission
    pub fn submittable(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().filter(|c| c.is_submittable())
    }

    /// Number of active, submittable labels whose marker shares `code`'s base code
    pub fn count_active(&self, code: &str) -> usize {
        let base = base_code(code);
        self.submittable()
            .filter(|c| c.base_label() == Some(base))
            .count()
    }

    /// Highest assigned id
    pub fn max_id(&self) -> Option<ChunkId> {
        self.chunks.iter().filter_map(|c| c.id).max()
    }

    /// Drop every chunk
    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}
