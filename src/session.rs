//! Annotation session
//!
//! A [`Session`] owns everything one annotated document needs: the tree,
//! its chunks and relations, the form, plugins and request state. Every
//! user action is a method; every method that changes state first checks
//! that no request is in flight, so a response can never be applied to
//! indices that moved underneath it.
//!
//! ```text
//! select ──► mark ──► activate ×N ──► mark_relation ──► submit_request
//!                                                          │
//!                                  apply_submit ◄──────────┘
//! ```
//!
//! After every mutation the derived presentation is recomputed: nesting
//! styles, relation badges and delete buttons.
//!
//! [`SharedSession`] wraps a session in one exclusive lock for use from
//! several threads (a headless server, a UI with a network thread).

use std::sync::Arc;

use compact_str::CompactString;
use parking_lot::Mutex;

use crate::chunk::{Chunk, ChunkList};
use crate::config::SessionConfig;
use crate::convert::from_html;
use crate::error::{LabelError, RelationError, Result, SessionError};
use crate::form::{FieldKind, FieldValues, FormState};
use crate::id::{LabelId, RelationId, StorageKey};
use crate::label::{decorate, label_data, mark_span, restyle, unwrap_label};
use crate::marker::{base_code, MarkerSet, Scope};
use crate::node::Document;
use crate::offset::previous_text_length;
use crate::plugin::{Event, EventBus, EventKind, PluginRegistry};
use crate::protocol::{
    FlagRequest, NewTextResponse, Pagination, RequestKind, RestoreBatchResponse, SubmitRequest, SubmitResponse,
    UndoResponse,
};
use crate::relation::{self, ActiveLabel, Relation, RelationMap, RelationOutcome, Remap};
use crate::restore::{self, RestoreReport};
use crate::restrict::{check_required, check_restrictions, Prompt};
use crate::selection::{compute_spans, Selection};
use crate::span::Span;
use crate::submit::assemble;

// =============================================================================
// Request tickets
// =============================================================================

/// Proof that a request was started; required to apply its response
#[derive(Debug, PartialEq, Eq)]
pub struct RequestTicket {
    kind: RequestKind,
    seq: u64,
}

impl RequestTicket {
    pub fn kind(&self) -> RequestKind {
        self.kind
    }
}

/// The request currently in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    kind: RequestKind,
    seq: u64,
}

// =============================================================================
// Session
// =============================================================================

/// State of one annotation session
#[derive(Debug)]
pub struct Session {
    doc: Document,
    config: SessionConfig,
    markers: MarkerSet,
    chunks: ChunkList,
    relations: RelationMap,
    current_relation: Option<RelationId>,
    active: Vec<ActiveLabel>,
    clock: u64,
    form: FormState,
    plugins: PluginRegistry,
    events: EventBus,
    next_label: LabelId,
    /// Editing a restored batch: deletions are soft
    editing_batch: bool,
    ds_id: u64,
    dp_id: u64,
    in_flight: Option<InFlight>,
    request_seq: u64,
    undo_enabled: bool,
    submitted: u64,
    submitted_today: u64,
    /// Bumped after every mutation
    revision: u64,
}

impl Session {
    /// Create a session over a document
    pub fn new(doc: Document, markers: MarkerSet, config: SessionConfig) -> Self {
        let mut session = Self {
            doc: Document::default(),
            relations: RelationMap::new(config.layout),
            config,
            markers,
            chunks: ChunkList::new(),
            current_relation: None,
            active: Vec::new(),
            clock: 0,
            form: FormState::new(),
            plugins: PluginRegistry::new(),
            events: EventBus::new(),
            next_label: LabelId::from_raw(1),
            editing_batch: false,
            ds_id: 0,
            dp_id: 0,
            in_flight: None,
            request_seq: 0,
            undo_enabled: false,
            submitted: 0,
            submitted_today: 0,
            revision: 0,
        };
        session.install(doc);
        session
    }

    /// Create a session over an HTML fragment
    pub fn from_html(html: &str, markers: MarkerSet, config: SessionConfig) -> Result<Self> {
        Ok(Self::new(from_html(html)?, markers, config))
    }

    /// Set the form controls (builder)
    pub fn with_form(mut self, form: FormState) -> Self {
        self.form = form;
        self
    }

    /// Set the plugin registry (builder)
    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    /// Set the datasource and datapoint ids (builder)
    pub fn with_ids(mut self, ds_id: u64, dp_id: u64) -> Self {
        self.ds_id = ds_id;
        self.dp_id = dp_id;
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    pub fn chunks(&self) -> &ChunkList {
        &self.chunks
    }

    pub fn relations(&self) -> &RelationMap {
        &self.relations
    }

    pub fn current_relation(&self) -> Option<RelationId> {
        self.current_relation
    }

    /// Clicked labels in selection order
    pub fn active(&self) -> &[ActiveLabel] {
        &self.active
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Event bus, for subscribing
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn ids(&self) -> (u64, u64) {
        (self.ds_id, self.dp_id)
    }

    pub fn is_editing_batch(&self) -> bool {
        self.editing_batch
    }

    pub fn undo_enabled(&self) -> bool {
        self.undo_enabled
    }

    /// Submission counters reported by the server
    pub fn submitted(&self) -> (u64, u64) {
        (self.submitted, self.submitted_today)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Kind of the request in flight, if any
    pub fn in_flight(&self) -> Option<RequestKind> {
        self.in_flight.map(|f| f.kind)
    }

    /// Form controls, for user input
    pub fn form_mut(&mut self) -> Result<&mut FormState> {
        self.ensure_idle()?;
        Ok(&mut self.form)
    }

    /// Plugin registry, for storing values
    pub fn plugins_mut(&mut self) -> Result<&mut PluginRegistry> {
        self.ensure_idle()?;
        Ok(&mut self.plugins)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Request lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    fn ensure_idle(&self) -> std::result::Result<(), SessionError> {
        match self.in_flight {
            Some(pending) => Err(SessionError::RequestInFlight(pending.kind)),
            None => Ok(()),
        }
    }

    /// Start a request; fails while another one is pending
    pub fn begin_request(&mut self, kind: RequestKind) -> std::result::Result<RequestTicket, SessionError> {
        self.ensure_idle()?;
        self.request_seq += 1;
        let seq = self.request_seq;
        self.in_flight = Some(InFlight { kind, seq });
        tracing::debug!(%kind, seq, "request started");
        Ok(RequestTicket { kind, seq })
    }

    /// Release the pending request
    pub fn finish_request(&mut self, ticket: RequestTicket) -> std::result::Result<RequestKind, SessionError> {
        match self.in_flight {
            Some(pending) if pending.kind == ticket.kind && pending.seq == ticket.seq => {
                self.in_flight = None;
                tracing::debug!(kind = %ticket.kind, seq = ticket.seq, "request finished");
                Ok(ticket.kind)
            }
            _ => Err(SessionError::StaleTicket),
        }
    }

    /// Release a request that failed on the network or server side
    ///
    /// State is left as it was; a failed submission disables undo.
    pub fn fail_request(&mut self, ticket: RequestTicket) -> std::result::Result<(), SessionError> {
        let kind = self.finish_request(ticket)?;
        if kind == RequestKind::Submit {
            self.undo_enabled = false;
        }
        tracing::warn!(%kind, "request failed");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Document installation
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the document, resetting chunks, relations and active labels
    ///
    /// Labels already present in the document become marked chunks. Labels
    /// without an id get fresh ones above the highest existing id.
    pub fn install(&mut self, doc: Document) {
        self.doc = doc;
        self.chunks.clear();
        self.relations.clear();
        self.current_relation = None;
        self.active.clear();
        self.plugins.clear_values();
        self.index_labels();
        self.refresh();
        tracing::debug!(len = self.doc.len(), labels = self.chunks.len(), "installed document");
    }

    fn index_labels(&mut self) {
        let highest = self.doc.label_ids().into_iter().max().unwrap_or_default();
        let mut next = highest.next();
        self.doc.for_each_element_mut(|elem| {
            if let Some(data) = elem.label_data_mut()
                && data.id.as_raw() == 0
            {
                data.id = next;
                next = next.next();
            }
        });
        self.next_label = next;

        for id in self.doc.label_ids() {
            let Some(first) = self.doc.first_label_path(id) else {
                continue;
            };
            let Some(start) = previous_text_length(&self.doc, &first) else {
                continue;
            };
            let Some(data) = self.doc.element_at(&first).and_then(|e| e.label_data()) else {
                continue;
            };
            let mut chunk = Chunk::marked(id, Span::new(start, start + self.doc.label_length(id)), data.marker.clone());
            chunk.hash = data.hash.clone();
            chunk.submittable = !data.disabled && data.hash.is_none();
            chunk.independent = self.markers.resolve(&data.marker).is_some_and(|m| m.independent);
            chunk.text = self.doc.label_text(id);
            self.chunks.push_marked(chunk);
        }
    }

    /// Recompute nesting styles, badges and delete buttons
    fn refresh(&mut self) {
        restyle(&mut self.doc, &self.config.nesting, self.config.display_type);
        let badges = self.relations.badges();
        decorate(&mut self.doc, &badges, self.config.delete_buttons);
        self.revision += 1;
    }

    fn publish(&self, event: Event) {
        self.events.publish(&event);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Labels
    // ─────────────────────────────────────────────────────────────────────────

    /// Turn a selection into the pending chunks, returning their spans
    pub fn select(&mut self, selection: &Selection) -> Result<Vec<Span>> {
        self.ensure_idle()?;
        let selected = compute_spans(&self.doc, selection);
        let text = self.doc.plain_text();
        let spans: Vec<Span> = selected.iter().map(|s| s.span).collect();
        self.chunks.set_pending(selected.into_iter().map(|s| {
            let mut chunk = Chunk::pending(s.span, s.range);
            chunk.text = text.chars().skip(s.span.start).take(s.span.len()).collect();
            chunk
        }));
        tracing::trace!(spans = spans.len(), "selection changed");
        Ok(spans)
    }

    /// Label the pending chunks with marker `code`
    pub fn mark(&mut self, code: &str, prompt: &mut dyn Prompt) -> Result<Vec<LabelId>> {
        self.ensure_idle()?;
        let marker = self
            .markers
            .resolve(code)
            .ok_or_else(|| LabelError::UnknownMarker(code.to_owned()))?
            .clone();
        if marker.scope != Scope::Span {
            return Err(LabelError::NotSpanScope(marker.code.to_string()).into());
        }
        if !self.chunks.has_pending() {
            return Err(LabelError::NoPendingSelection.into());
        }
        if let Some(max) = marker.max_per_input {
            let after = self.chunks.count_active(&marker.code) + self.chunks.pending().len();
            if after > max {
                let error = LabelError::MarkerLimit {
                    marker: marker.code.to_string(),
                    max,
                };
                prompt.alert(&error.to_string());
                return Err(error.into());
            }
        }

        let mut pending = self.chunks.take_pending().into_iter();
        let mut marked = Vec::new();
        while let Some(mut chunk) = pending.next() {
            let id = self.next_label;
            if let Err(error) = mark_span(&mut self.doc, chunk.span, label_data(id, &marker)) {
                tracing::warn!(%error, "marking failed");
                self.chunks.set_pending(std::iter::once(chunk).chain(pending));
                self.refresh();
                return Err(error.into());
            }
            self.next_label = id.next();
            chunk.id = Some(id);
            chunk.label = Some(marker.code.clone());
            chunk.marked = true;
            chunk.submittable = true;
            chunk.independent = marker.independent;
            chunk.hash = marker.hash.clone();
            chunk.extra.extend(marker.meta.iter().map(|(k, v)| (k.clone(), v.clone())));
            chunk.text = self.doc.label_text(id);
            chunk.range = None;
            self.chunks.push_marked(chunk);
            marked.push(id);
        }

        self.refresh();
        for &id in &marked {
            self.publish(Event::new(EventKind::LabelMarked).with_label(id));
        }
        tracing::debug!(marker = %marker.code, labels = marked.len(), "marked selection");
        Ok(marked)
    }

    /// Delete a label, dropping it from every relation
    ///
    /// While editing a restored batch the chunk is kept as soft-deleted,
    /// holding on to its id and hash.
    pub fn delete_label(&mut self, id: LabelId) -> Result<()> {
        self.ensure_idle()?;
        if self.chunks.get(id).is_none_or(|c| !c.is_active()) {
            return Err(LabelError::UnknownLabel(id).into());
        }

        let remap = self.relations.remove_label(id);
        self.apply_remap(&remap);
        self.active.retain(|a| a.id != id);
        unwrap_label(&mut self.doc, id);
        self.plugins.remove(StorageKey::Label(id));

        if self.editing_batch {
            if let Some(chunk) = self.chunks.get_mut(id) {
                chunk.deleted = true;
            }
        } else {
            self.chunks.remove(id);
        }

        self.refresh();
        self.publish(Event::new(EventKind::LabelDeleted).with_label(id));
        Ok(())
    }

    /// Keep a label visible but exclude it from submissions
    pub fn disable_label(&mut self, id: LabelId) -> Result<()> {
        self.ensure_idle()?;
        let chunk = self.chunks.get_mut(id).ok_or(LabelError::UnknownLabel(id))?;
        chunk.submittable = false;
        self.doc.for_each_element_mut(|elem| {
            if let Some(data) = elem.label_data_mut()
                && data.id == id
            {
                data.disabled = true;
            }
        });
        self.refresh();
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Relations
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a label to the active set
    pub fn activate_label(&mut self, id: LabelId) -> Result<()> {
        self.ensure_idle()?;
        let code = self
            .chunks
            .get(id)
            .filter(|c| c.is_active())
            .and_then(|c| c.label.clone())
            .ok_or(LabelError::UnknownLabel(id))?;
        if !self.active.iter().any(|a| a.id == id) {
            self.clock += 1;
            self.active.push(ActiveLabel::new(id, code, self.clock));
        }
        Ok(())
    }

    /// Remove a label from the active set; returns whether it was active
    pub fn deactivate_label(&mut self, id: LabelId) -> bool {
        let before = self.active.len();
        self.active.retain(|a| a.id != id);
        before != self.active.len()
    }

    pub fn clear_active(&mut self) {
        self.active.clear();
    }

    /// Relate the active labels under a rule
    ///
    /// Count restrictions are checked against the active labels of the
    /// rule's marker types only.
    pub fn mark_relation(&mut self, rule_id: &str, prompt: &mut dyn Prompt) -> Result<RelationOutcome> {
        self.ensure_idle()?;
        let rule = self
            .markers
            .rule_by_id(rule_id)
            .cloned()
            .ok_or_else(|| RelationError::UnknownRule(rule_id.to_owned()))?;

        let involved = MarkerSet {
            markers: self
                .markers
                .markers
                .iter()
                .filter(|m| rule.involves(m.base_code()))
                .cloned()
                .collect(),
            rules: Vec::new(),
        };
        let active = &self.active;
        check_restrictions(
            &involved,
            |m| active.iter().filter(|a| base_code(&a.code) == m.base_code()).count(),
            prompt,
        )?;

        let outcome = match relation::mark_relation(&mut self.relations, &rule, &self.active, self.current_relation) {
            Ok(outcome) => outcome,
            Err(error) => {
                prompt.alert(&error.to_string());
                return Err(error.into());
            }
        };
        self.apply_remap(&outcome.remap);
        self.current_relation = Some(outcome.id);
        self.active.clear();
        self.refresh();
        self.publish(Event::new(EventKind::RelationChanged).with_relation(outcome.id));
        Ok(outcome)
    }

    /// Move a label between relations (either side may be `None`)
    pub fn change_relation(
        &mut self,
        label: LabelId,
        from: Option<RelationId>,
        to: Option<RelationId>,
        prompt: &mut dyn Prompt,
    ) -> Result<Remap> {
        self.ensure_idle()?;
        let code: CompactString = self
            .chunks
            .get(label)
            .and_then(|c| c.label.clone())
            .ok_or(LabelError::UnknownLabel(label))?;

        let remap = match relation::change_relation(&mut self.relations, label, &code, from, to) {
            Ok(remap) => remap,
            Err(error) => {
                prompt.alert(&error.to_string());
                return Err(error.into());
            }
        };
        self.apply_remap(&remap);
        self.refresh();
        let changed = to.and_then(|id| remap.get(id)).or(from.and_then(|id| remap.get(id)));
        let mut event = Event::new(EventKind::RelationChanged).with_label(label);
        event.relation = changed;
        self.publish(event);
        Ok(remap)
    }

    /// Dissolve a relation
    pub fn remove_relation(&mut self, id: RelationId) -> Result<Relation> {
        self.ensure_idle()?;
        let (removed, remap) = relation::remove_relation(&mut self.relations, id)?;
        self.apply_remap(&remap);
        self.refresh();
        self.publish(Event::new(EventKind::RelationChanged).with_relation(id));
        Ok(removed)
    }

    /// Switch the relation on view
    pub fn set_current_relation(&mut self, id: Option<RelationId>) -> Result<()> {
        self.ensure_idle()?;
        if let Some(id) = id
            && self.relations.get(id).is_none()
        {
            return Err(RelationError::UnknownRelation(id).into());
        }
        self.current_relation = id;
        Ok(())
    }

    /// Follow renumbered relations in plugin values and the current relation
    fn apply_remap(&mut self, remap: &Remap) {
        if remap.is_identity() {
            return;
        }
        self.plugins.remap_relations(remap);
        self.current_relation = self.current_relation.and_then(|id| remap.get(id));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Submission
    // ─────────────────────────────────────────────────────────────────────────

    /// Check restrictions and required fields, then start a submission
    ///
    /// Nothing is sent when a check fails.
    pub fn submit_request(
        &mut self,
        pagination: Option<Pagination>,
        prompt: &mut dyn Prompt,
    ) -> Result<(RequestTicket, SubmitRequest)> {
        self.ensure_idle()?;
        let chunks = &self.chunks;
        let form = &self.form;
        check_restrictions(
            &self.markers,
            |m| match m.scope {
                Scope::Span => chunks.count_active(&m.code),
                Scope::Text => form
                    .selected_markers()
                    .iter()
                    .filter(|c| base_code(&c.code) == m.base_code())
                    .count(),
            },
            prompt,
        )?;
        check_required(&self.form, prompt)?;

        let payload = assemble(&self.chunks, &self.relations, &self.form, &self.plugins, &self.config);
        let request = SubmitRequest {
            payload,
            context: self.doc.text_content(),
            datasource: self.ds_id,
            datapoint: self.dp_id,
            mode: self.config.mode,
            pagination: (!self.config.mode.is_regular()).then(|| pagination.unwrap_or_default()),
        };
        let ticket = self.begin_request(RequestKind::Submit)?;
        Ok((ticket, request))
    }

    /// Apply a submission response
    ///
    /// Submitted chunks are tagged with the batch and leave the submittable
    /// set; relations, active labels and form values start over.
    pub fn apply_submit(&mut self, ticket: RequestTicket, response: SubmitResponse) -> Result<()> {
        if response.error {
            self.fail_request(ticket)?;
            return Err(SessionError::Server(RequestKind::Submit).into());
        }
        self.finish_request(ticket)?;

        let mut count = 0;
        for chunk in self.chunks.iter_mut().filter(|c| c.is_submittable()) {
            chunk.submittable = false;
            chunk.batch = response.batch.clone();
            count += 1;
        }
        self.relations.clear();
        self.current_relation = None;
        self.active.clear();
        self.clock = 0;
        self.plugins.clear_values();
        self.form.reset();
        self.undo_enabled = true;
        self.submitted += 1;
        self.submitted_today += 1;

        self.refresh();
        self.publish(Event::new(EventKind::Submitted));
        tracing::debug!(chunks = count, batch = ?response.batch, "submission accepted");
        Ok(())
    }

    /// Start an undo of the last submission
    pub fn undo_request(&mut self) -> Result<RequestTicket> {
        Ok(self.begin_request(RequestKind::Undo)?)
    }

    /// Apply an undo response: chunks of the returned batches become
    /// submittable again. Returns how many did.
    pub fn apply_undo(&mut self, ticket: RequestTicket, response: UndoResponse) -> Result<usize> {
        self.finish_request(ticket)?;
        let mut count = 0;
        for chunk in self.chunks.iter_mut() {
            if chunk.batch.as_ref().is_some_and(|b| response.batch.contains(b)) {
                chunk.batch = None;
                chunk.submittable = chunk.is_active();
                count += 1;
            }
        }
        self.submitted = response.submitted;
        self.submitted_today = response.submitted_today;
        self.undo_enabled = false;
        self.refresh();
        tracing::debug!(chunks = count, "undid submission");
        Ok(count)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Texts and batches
    // ─────────────────────────────────────────────────────────────────────────

    /// Start loading the next text (`NewText`, `Skip` or `FinishRound`)
    pub fn text_request(&mut self, kind: RequestKind) -> Result<RequestTicket> {
        Ok(self.begin_request(kind)?)
    }

    /// Install the next text
    pub fn load_text(&mut self, ticket: RequestTicket, response: NewTextResponse) -> Result<()> {
        self.finish_request(ticket)?;
        let doc = from_html(&response.text)?;
        self.install(doc);
        self.form.reset();
        self.editing_batch = false;
        self.ds_id = response.dp_info.source_id;
        self.dp_id = response.dp_info.id;
        self.publish(Event::new(EventKind::TextLoaded));
        tracing::debug!(ds = self.ds_id, dp = self.dp_id, empty = response.dp_info.is_empty, "loaded text");
        Ok(())
    }

    /// Start fetching a submitted batch for editing
    pub fn restore_request(&mut self) -> Result<RequestTicket> {
        Ok(self.begin_request(RequestKind::RestoreBatch)?)
    }

    /// Install a batch's content and replay its annotations
    ///
    /// Restoration is best-effort: the report lists what could not be
    /// placed, and a non-clean report is announced once through `prompt`.
    pub fn restore_batch(
        &mut self,
        ticket: RequestTicket,
        response: RestoreBatchResponse,
        prompt: &mut dyn Prompt,
    ) -> Result<RestoreReport> {
        self.finish_request(ticket)?;
        let doc = from_html(&response.context.content)?;
        self.install(doc);
        self.form.reset();
        self.editing_batch = true;
        self.ds_id = response.context.ds_id;
        self.dp_id = response.context.dp_id;

        let labels = &response.span_labels;
        let Self {
            doc,
            markers,
            chunks,
            plugins,
            next_label,
            ..
        } = self;
        let mut report = restore::replay(doc, markers, labels, next_label, |restored| {
            let mut chunk = Chunk::marked(restored.id, restored.span, restored.marker.clone());
            chunk.text = restored.text;
            chunk.hash = restored.hash;
            chunk.submittable = !restored.undone;
            chunk.independent = markers.get(&restored.marker).is_some_and(|m| m.independent);
            for (plugin, value) in &labels[restored.index].extra {
                plugins.restore_value(StorageKey::Label(restored.id), plugin, value.clone());
            }
            chunks.push_marked(chunk);
        });
        report.merge(restore::restore_text_markers(&mut self.form, &self.markers, &response.text_labels));
        report.merge(restore::restore_non_unit_markers(
            &mut self.form,
            &response.non_unit_markers,
            &self.config.checkbox_separator,
        ));

        restore::warn_if_likely_wrong(&report, prompt);
        self.refresh();
        self.publish(Event::new(EventKind::Restored));
        Ok(report)
    }

    /// Build a flag-feedback request from a validated feedback form
    pub fn flag_request(&mut self, feedback: &FormState, prompt: &mut dyn Prompt) -> Result<(RequestTicket, FlagRequest)> {
        self.ensure_idle()?;
        check_required(feedback, prompt)?;

        let mut fields = FieldValues::default();
        for kind in [FieldKind::ShortText, FieldKind::LongText, FieldKind::Number, FieldKind::Range] {
            fields.extend(feedback.values(kind));
        }
        fields.extend(feedback.radio(&self.config.radio_separator));
        fields.extend(feedback.checkboxes(&self.config.checkbox_separator));

        let request = FlagRequest {
            feedback: serde_json::to_string(&fields)?,
            ds_id: self.ds_id,
            dp_id: self.dp_id,
        };
        let ticket = self.begin_request(RequestKind::Flag)?;
        Ok((ticket, request))
    }
}

// =============================================================================
// SharedSession
// =============================================================================

/// Thread-safe session handle: one exclusive lock per document session
#[derive(Debug, Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Execute a closure with read access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        let guard = self.inner.lock();
        f(&guard)
    }

    /// Execute a closure with write access to the session.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use static_assertions::assert_impl_all;

    use super::*;
    use crate::error::{RestrictionError, TextinatorError};
    use crate::form::FormField;
    use crate::marker::{Direction, Marker, RelationRule};
    use crate::node::{is_ancestor, Boundary, DomRange};
    use crate::plugin::{CommentPlugin, Target};
    use crate::protocol::{DataPointInfo, RestoreContext, SpanLabel};
    use crate::restrict::RecordingPrompt;

    assert_impl_all!(SharedSession: Send, Sync);
    assert_impl_all!(Session: Send);

    fn markers() -> MarkerSet {
        MarkerSet::new()
            .marker(Marker::new("PER").with_colors("#ff0", "#000"))
            .marker(Marker::new("LOC"))
            .marker(Marker::new("SENT"))
            .rule(RelationRule::new("meets", &[("PER", "PER")], Direction::Bidirectional))
            .rule(RelationRule::new("lives", &[("PER", "LOC")], Direction::Forward))
    }

    fn session(text: &str) -> Session {
        Session::new(Document::from_text(text), markers(), SessionConfig::REGULAR)
    }

    /// Select `[start, end)` of the first paragraph's only text run
    fn select(session: &mut Session, start: usize, end: usize) {
        let span = Span::new(start, end);
        let selection = Selection::from_span(session.doc(), span).unwrap();
        assert_eq!(session.select(&selection).unwrap(), vec![span]);
    }

    fn mark(session: &mut Session, start: usize, end: usize, code: &str) -> LabelId {
        select(session, start, end);
        session.mark(code, &mut RecordingPrompt::default()).unwrap()[0]
    }

    #[test]
    fn test_mark_and_delete_restores_text() {
        let mut s = session("Alice met Bob in Paris.");
        let alice = mark(&mut s, 0, 5, "PER");
        assert_eq!(s.doc().label_text(alice), "Alice");
        assert_eq!(s.chunks().count_active("PER"), 1);
        let chunk = s.chunks().get(alice).unwrap();
        assert_eq!((chunk.span, chunk.text.as_str()), (Span::new(0, 5), "Alice"));

        s.delete_label(alice).unwrap();
        assert!(s.doc().label_ids().is_empty());
        assert_eq!(s.doc().text_content(), "Alice met Bob in Paris.");
        assert!(s.chunks().is_empty());
    }

    #[test]
    fn test_offsets_round_trip() {
        let mut s = session("Alice met Bob in Paris.");
        let _sent = mark(&mut s, 0, 23, "SENT");
        let bob = mark(&mut s, 10, 13, "PER");
        let first = s.doc().first_label_path(bob).unwrap();
        assert_eq!(previous_text_length(s.doc(), &first), Some(10));
        assert_eq!(s.doc().label_length(bob), 3);
    }

    #[test]
    fn test_mark_requires_selection_and_span_scope() {
        let mut s = session("Alice met Bob");
        let mut prompt = RecordingPrompt::default();
        assert!(matches!(
            s.mark("PER", &mut prompt),
            Err(TextinatorError::Label(LabelError::NoPendingSelection))
        ));
        select(&mut s, 0, 5);
        assert!(matches!(
            s.mark("ORG", &mut prompt),
            Err(TextinatorError::Label(LabelError::UnknownMarker(_)))
        ));
    }

    #[test]
    fn test_marker_limit_alerts() {
        let markers = MarkerSet::new().marker(Marker::new("PER").with_max(1));
        let mut s = Session::new(Document::from_text("Alice met Bob"), markers, SessionConfig::REGULAR);
        let _alice = mark(&mut s, 0, 5, "PER");
        select(&mut s, 10, 13);
        let mut prompt = RecordingPrompt::default();
        let result = s.mark("PER", &mut prompt);
        assert!(matches!(result, Err(TextinatorError::Label(LabelError::MarkerLimit { max: 1, .. }))));
        assert_eq!(prompt.alerts.len(), 1);
        assert!(s.chunks().has_pending());
    }

    #[test]
    fn test_relations_have_no_self_loops_and_dense_ids() {
        let mut s = session("Alice met Bob and Carol in Paris.");
        let alice = mark(&mut s, 0, 5, "PER");
        let bob = mark(&mut s, 10, 13, "PER");
        let carol = mark(&mut s, 18, 23, "PER");
        let paris = mark(&mut s, 27, 32, "LOC");
        let mut prompt = RecordingPrompt::answering(true);

        s.activate_label(alice).unwrap();
        s.activate_label(paris).unwrap();
        let lives = s.mark_relation("lives", &mut prompt).unwrap();
        assert!(s.active().is_empty());

        s.set_current_relation(None).unwrap();
        s.activate_label(bob).unwrap();
        s.activate_label(carol).unwrap();
        s.activate_label(bob).unwrap();
        let meets = s.mark_relation("meets", &mut prompt).unwrap();
        assert_ne!(lives.id, meets.id);

        for (_, relation) in s.relations().iter() {
            assert!(relation.links.iter().all(|l| l.s != l.t));
        }

        s.remove_relation(lives.id).unwrap();
        let ids: Vec<_> = s.relations().ids().map(|id| id.as_raw()).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(s.current_relation(), Some(RelationId::FIRST));
    }

    #[test]
    fn test_badges_follow_relations() {
        let mut s = session("Alice met Bob");
        let alice = mark(&mut s, 0, 5, "PER");
        let bob = mark(&mut s, 10, 13, "PER");
        s.activate_label(alice).unwrap();
        s.activate_label(bob).unwrap();
        s.mark_relation("meets", &mut RecordingPrompt::answering(true)).unwrap();

        let badge = s.doc().find_element(|e| e.kind.is_chrome() && e.text_content() == "1");
        assert!(badge.is_some());

        s.delete_label(bob).unwrap();
        assert!(s.relations().is_empty());
        assert!(s.doc().find_element(|e| e.tag == "sup").is_none());
    }

    #[test]
    fn test_strict_restriction_blocks_submit() {
        let markers = MarkerSet::new().marker(Marker::new("PER").with_restriction("ge2s".parse().unwrap()));
        let mut s = Session::new(Document::from_text("Alice met Bob"), markers, SessionConfig::REGULAR);
        let _alice = mark(&mut s, 0, 5, "PER");

        let mut prompt = RecordingPrompt::answering(true);
        let result = s.submit_request(None, &mut prompt);
        assert!(matches!(
            result,
            Err(TextinatorError::Restriction(RestrictionError::Unmet { count: 1, .. }))
        ));
        assert_eq!(prompt.alerts.len(), 1);
        assert_eq!(s.in_flight(), None);

        let _bob = mark(&mut s, 10, 13, "PER");
        let (ticket, request) = s.submit_request(None, &mut prompt).unwrap();
        assert_eq!(request.payload.chunks.len(), 2);
        assert_eq!(request.context, "Alice met Bob");
        assert_eq!(ticket.kind(), RequestKind::Submit);
    }

    #[test]
    fn test_in_flight_guard_and_submit_cycle() {
        let mut s = session("Alice met Bob").with_ids(3, 17);
        let alice = mark(&mut s, 0, 5, "PER");
        let (ticket, request) = s.submit_request(None, &mut RecordingPrompt::default()).unwrap();
        assert_eq!((request.datasource, request.datapoint), (3, 17));
        assert!(request.pagination.is_none());

        let blocked = s.delete_label(alice);
        assert!(blocked.as_ref().is_err_and(|e| e.is_in_flight()));
        assert!(s.begin_request(RequestKind::Undo).is_err());

        let response = SubmitResponse {
            batch: Some("b-1".into()),
            ..SubmitResponse::default()
        };
        s.apply_submit(ticket, response).unwrap();
        assert_eq!(s.chunks().submittable().count(), 0);
        assert_eq!(s.chunks().get(alice).and_then(|c| c.batch.as_deref()), Some("b-1"));
        assert!(s.undo_enabled());

        let ticket = s.undo_request().unwrap();
        let undone = s
            .apply_undo(
                ticket,
                UndoResponse {
                    batch: vec!["b-1".into()],
                    submitted: 4,
                    submitted_today: 1,
                    input: None,
                },
            )
            .unwrap();
        assert_eq!(undone, 1);
        assert_eq!(s.chunks().submittable().count(), 1);
        assert_eq!(s.submitted(), (4, 1));
    }

    #[test]
    fn test_failed_submit_disables_undo() {
        let mut s = session("Alice met Bob");
        let _alice = mark(&mut s, 0, 5, "PER");
        let (ticket, _) = s.submit_request(None, &mut RecordingPrompt::default()).unwrap();
        let stale = RequestTicket {
            kind: RequestKind::Submit,
            seq: 99,
        };
        assert_eq!(s.finish_request(stale), Err(SessionError::StaleTicket));

        let response = SubmitResponse {
            error: true,
            ..SubmitResponse::default()
        };
        assert!(s.apply_submit(ticket, response).is_err());
        assert!(!s.undo_enabled());
        assert_eq!(s.in_flight(), None);
        assert_eq!(s.chunks().submittable().count(), 1);
    }

    #[test]
    fn test_restore_batch_end_to_end() {
        let mut s = session("");
        s.plugins_mut().unwrap().register(CommentPlugin);
        let restored_events = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&restored_events);
        s.events_mut().subscribe(EventKind::Restored, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut bob = SpanLabel::new(10, 13, "PER").with_hash("h2");
        bob.extra.insert("comment".into(), "the other one".into());
        let response = RestoreBatchResponse {
            context: RestoreContext {
                ds_id: 2,
                dp_id: 9,
                content: "<p>Alice met Bob in Paris.</p>".into(),
            },
            span_labels: vec![SpanLabel::new(0, 5, "PER").with_hash("h1"), bob, SpanLabel::new(17, 22, "LOC")],
            ..RestoreBatchResponse::default()
        };

        let ticket = s.restore_request().unwrap();
        let mut prompt = RecordingPrompt::default();
        let report = s.restore_batch(ticket, response, &mut prompt).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.restored, 3);
        assert!(prompt.alerts.is_empty());
        assert!(s.is_editing_batch());
        assert_eq!(s.ids(), (2, 9));
        assert_eq!(restored_events.load(Ordering::SeqCst), 1);

        let texts: Vec<String> = s
            .doc()
            .iter_elements()
            .filter(|e| e.kind.is_label())
            .map(|e| e.text_content())
            .collect();
        assert_eq!(texts, vec!["Alice", "Bob", "Paris"]);

        let bob_id = s.chunks().iter().find(|c| c.text == "Bob").and_then(|c| c.id).unwrap();
        assert_eq!(s.plugins().value(StorageKey::Label(bob_id), "comment"), Some("the other one"));
        assert_eq!(s.chunks().get(bob_id).and_then(|c| c.hash.as_deref()), Some("h2"));

        // Soft delete while editing a batch
        s.delete_label(bob_id).unwrap();
        assert!(s.chunks().get(bob_id).is_some_and(|c| c.deleted));
        let (_, request) = s.submit_request(None, &mut prompt).unwrap();
        assert_eq!(request.payload.chunks.len(), 2);
    }

    #[test]
    fn test_restore_nested_and_failures_warn_once() {
        let mut s = session("");
        let response = RestoreBatchResponse {
            context: RestoreContext {
                content: "<p>Alice met Bob in Paris.</p>".into(),
                ..RestoreContext::default()
            },
            span_labels: vec![
                SpanLabel::new(0, 23, "SENT"),
                SpanLabel::new(0, 5, "PER"),
                SpanLabel::new(5, 90, "PER"),
                SpanLabel::new(3, 3, "LOC"),
            ],
            ..RestoreBatchResponse::default()
        };
        let ticket = s.restore_request().unwrap();
        let mut prompt = RecordingPrompt::default();
        let report = s.restore_batch(ticket, response, &mut prompt).unwrap();

        assert_eq!(report.restored, 2);
        assert_eq!(report.likely_errors(), 2);
        assert_eq!(prompt.alerts.len(), 1);

        let sent = s.chunks().iter().find(|c| c.label.as_deref() == Some("SENT")).and_then(|c| c.id).unwrap();
        let per = s.chunks().iter().find(|c| c.label.as_deref() == Some("PER")).and_then(|c| c.id).unwrap();
        let sent_path = s.doc().first_label_path(sent).unwrap();
        let per_path = s.doc().first_label_path(per).unwrap();
        assert!(is_ancestor(&sent_path, &per_path));
    }

    #[test]
    fn test_undone_labels_are_not_submitted() {
        let mut s = session("");
        let mut undone = SpanLabel::new(10, 13, "PER");
        undone.undone = true;
        let response = RestoreBatchResponse {
            context: RestoreContext {
                content: "<p>Alice met Bob</p>".into(),
                ..RestoreContext::default()
            },
            span_labels: vec![SpanLabel::new(0, 5, "PER"), undone],
            ..RestoreBatchResponse::default()
        };
        let ticket = s.restore_request().unwrap();
        s.restore_batch(ticket, response, &mut RecordingPrompt::default()).unwrap();

        let (_, request) = s.submit_request(None, &mut RecordingPrompt::default()).unwrap();
        let texts: Vec<_> = request.payload.chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Alice"]);
        // Disabled labels carry no delete button
        let buttons = s.doc().iter_elements().filter(|e| e.tag == "button").count();
        assert_eq!(buttons, 1);
    }

    #[test]
    fn test_multi_paragraph_selection() {
        let first = "a".repeat(79);
        let second = "b".repeat(79);
        let mut s = Session::from_html(&format!("<p>{first}</p><p>{second}</p>"), markers(), SessionConfig::REGULAR).unwrap();
        let sent = mark(&mut s, 40, 120, "SENT");
        assert_eq!(s.doc().label_length(sent), 80);
        assert_eq!(s.doc().label_text(sent).chars().count(), 79);
        assert_eq!(s.chunks().get(sent).map(|c| c.span), Some(Span::new(40, 120)));
    }

    #[test]
    fn test_install_indexes_existing_labels() {
        let html = r#"<p><span class="tag" data-i="4" data-s="PER" data-h="x1">Alice</span> met <span class="tag" data-s="PER">Bob</span></p>"#;
        let mut s = Session::from_html(html, markers(), SessionConfig::REGULAR).unwrap();
        let ids: Vec<_> = s.chunks().iter().filter_map(|c| c.id).map(|id| id.as_raw()).collect();
        assert_eq!(ids, vec![4, 5]);
        assert!(!s.chunks().get(LabelId::from_raw(4)).unwrap().submittable);
        assert_eq!(s.chunks().get(LabelId::from_raw(5)).map(|c| c.span), Some(Span::new(10, 13)));

        let paris = {
            s.doc.root.push_elem(crate::node::Element::paragraph().text("Paris"));
            mark(&mut s, 14, 19, "LOC")
        };
        assert_eq!(paris, LabelId::from_raw(6));
    }

    #[test]
    fn test_load_text_resets_state() {
        let mut s = session("Alice met Bob")
            .with_form(FormState::new().field(FormField::new("note", FieldKind::ShortText)));
        let _alice = mark(&mut s, 0, 5, "PER");
        s.form_mut().unwrap().set_value("note", "hi");

        let ticket = s.text_request(RequestKind::Skip).unwrap();
        let response = NewTextResponse {
            dp_info: DataPointInfo {
                source_id: 1,
                id: 42,
                source_name: "news".into(),
                is_empty: false,
            },
            text: "<p>Carol went home.</p>".into(),
        };
        s.load_text(ticket, response).unwrap();
        assert!(s.chunks().is_empty());
        assert_eq!(s.ids(), (1, 42));
        assert_eq!(s.doc().text_content(), "Carol went home.");
        assert!(s.form().values(FieldKind::ShortText).is_empty());
    }

    #[test]
    fn test_change_relation_cross_type_alerts() {
        let mut s = session("Alice met Bob in Paris.");
        let alice = mark(&mut s, 0, 5, "PER");
        let bob = mark(&mut s, 10, 13, "PER");
        let paris = mark(&mut s, 17, 22, "LOC");
        let mut prompt = RecordingPrompt::answering(true);
        s.activate_label(alice).unwrap();
        s.activate_label(bob).unwrap();
        let meets = s.mark_relation("meets", &mut prompt).unwrap().id;
        s.set_current_relation(None).unwrap();
        s.activate_label(bob).unwrap();
        s.activate_label(paris).unwrap();
        let lives = s.mark_relation("lives", &mut prompt).unwrap().id;

        let result = s.change_relation(alice, Some(meets), Some(lives), &mut prompt);
        assert!(matches!(result, Err(TextinatorError::Relation(RelationError::CrossType { .. }))));
        assert_eq!(prompt.alerts.len(), 1);
        assert_eq!(s.relations().len(), 2);
    }

    #[test]
    fn test_plugin_values_survive_renumbering() {
        let mut s = session("Alice met Bob in Paris.").with_plugins(PluginRegistry::new().with(CommentPlugin));
        let alice = mark(&mut s, 0, 5, "PER");
        let bob = mark(&mut s, 10, 13, "PER");
        let paris = mark(&mut s, 17, 22, "LOC");
        let mut prompt = RecordingPrompt::answering(true);
        s.activate_label(alice).unwrap();
        s.activate_label(bob).unwrap();
        let first = s.mark_relation("meets", &mut prompt).unwrap().id;
        s.set_current_relation(None).unwrap();
        s.activate_label(bob).unwrap();
        s.activate_label(paris).unwrap();
        let second = s.mark_relation("lives", &mut prompt).unwrap().id;
        s.plugins_mut().unwrap().set_value("comment", Target::Relation(second), "moved in 2019");

        s.remove_relation(first).unwrap();
        assert_eq!(
            s.plugins().value(StorageKey::Relation(RelationId::FIRST), "comment"),
            Some("moved in 2019")
        );
    }

    #[test]
    fn test_edit_remark_carries_hash_and_meta() {
        let markers = MarkerSet::new().marker(
            Marker::new("PER")
                .independent(true)
                .with_hash("h-alice")
                .with_meta("source", "kb"),
        );
        let mut s = Session::new(Document::from_text("Alice met Bob"), markers, SessionConfig::EDIT);
        let alice = mark(&mut s, 0, 5, "PER");

        let chunk = s.chunks().get(alice).unwrap();
        assert_eq!(chunk.hash.as_deref(), Some("h-alice"));
        assert_eq!(chunk.extra.get("source").map(String::as_str), Some("kb"));
        let data = s.doc().find_element(|e| e.is_label_of(alice)).and_then(|e| e.label_data()).unwrap();
        assert_eq!(data.hash.as_deref(), Some("h-alice"));

        let (_, request) = s.submit_request(None, &mut RecordingPrompt::default()).unwrap();
        let submitted = &request.payload.chunks[0];
        assert_eq!(submitted.hash.as_deref(), Some("h-alice"));
        assert_eq!(submitted.extra.get("source").map(String::as_str), Some("kb"));
    }

    #[test]
    fn test_mark_inside_list_item() {
        let mut s = Session::from_html("<p>Hi</p><ul><li>ab</li></ul>", markers(), SessionConfig::REGULAR).unwrap();
        let id = mark(&mut s, 4, 6, "PER");
        assert_eq!(s.doc().label_text(id), "ab");
        assert_eq!(s.chunks().get(id).map(|c| c.span), Some(Span::new(4, 6)));
    }

    #[test]
    fn test_flag_request() {
        let mut s = session("Alice").with_ids(1, 2);
        let mut feedback = FormState::new().field(FormField::new("reason", FieldKind::LongText).required());
        let mut prompt = RecordingPrompt::default();
        assert!(s.flag_request(&feedback, &mut prompt).is_err());

        feedback.set_value("reason", "broken text");
        let (ticket, request) = s.flag_request(&feedback, &mut prompt).unwrap();
        assert_eq!(ticket.kind(), RequestKind::Flag);
        assert_eq!((request.ds_id, request.dp_id), (1, 2));
        let parsed: serde_json::Value = serde_json::from_str(&request.feedback).unwrap();
        assert_eq!(parsed["reason"]["value"], "broken text");
    }

    #[test]
    fn test_shared_session() {
        let shared = SharedSession::new(session("Alice met Bob"));
        let other = shared.clone();
        let handle = std::thread::spawn(move || {
            other.with_mut(|s| {
                let selection = Selection::single(DomRange::new(Boundary::new([0, 0], 0), Boundary::new([0, 0], 5)));
                s.select(&selection).unwrap();
                s.mark("PER", &mut RecordingPrompt::default()).unwrap()
            })
        });
        let marked = handle.join().unwrap();
        assert_eq!(marked, vec![LabelId::from_raw(1)]);
        assert_eq!(shared.with(|s| s.chunks().count_active("PER")), 1);
    }
}
