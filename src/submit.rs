//! Submission payload assembly
//!
//! Collects everything the next submission carries: submittable chunks and
//! relation links (each with its plugin values), and every kind of form
//! value. Nothing here mutates the session; resetting after a successful
//! submit is done by the session itself.

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, ChunkList};
use crate::config::SessionConfig;
use crate::form::{FieldKind, FieldValues, FormState, MarkerChoice};
use crate::id::{LabelId, StorageKey};
use crate::plugin::PluginRegistry;
use crate::relation::{Link, RelationMap};

/// Relation as submitted: its rule and links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub rule: CompactString,
    pub links: Vec<Link>,
    #[serde(default)]
    pub extra: FxHashMap<CompactString, String>,
}

/// The submission payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitPayload {
    pub relations: Vec<RelationRecord>,
    pub chunks: Vec<Chunk>,
    /// Submitted chunk ids per marker base code
    pub marker_groups: FxHashMap<CompactString, Vec<LabelId>>,
    pub short_text_markers: FieldValues,
    pub long_text_markers: FieldValues,
    pub text_markers: Vec<MarkerChoice>,
    pub numbers: FieldValues,
    pub ranges: FieldValues,
    pub radio: FieldValues,
    pub checkboxes: FieldValues,
}

impl SubmitPayload {
    /// Check if there is nothing to submit
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
            && self.chunks.is_empty()
            && self.short_text_markers.is_empty()
            && self.long_text_markers.is_empty()
            && self.text_markers.is_empty()
            && self.numbers.is_empty()
            && self.ranges.is_empty()
            && self.radio.is_empty()
            && self.checkboxes.is_empty()
    }
}

/// Build the payload from session state
pub fn assemble(
    chunks: &ChunkList,
    relations: &RelationMap,
    form: &FormState,
    plugins: &PluginRegistry,
    config: &SessionConfig,
) -> SubmitPayload {
    let mut payload = SubmitPayload::default();

    for chunk in chunks.submittable() {
        let mut chunk = chunk.clone();
        if let Some(id) = chunk.id {
            chunk.extra.extend(plugins.values_for(StorageKey::Label(id)));
            if let Some(code) = chunk.base_label() {
                payload.marker_groups.entry(code.into()).or_default().push(id);
            }
        }
        payload.chunks.push(chunk);
    }

    payload.relations = relations
        .iter()
        .map(|(id, relation)| RelationRecord {
            rule: relation.rule.clone(),
            links: relation.links.clone(),
            extra: plugins.values_for(StorageKey::Relation(id)),
        })
        .collect();

    payload.short_text_markers = form.values(FieldKind::ShortText);
    payload.long_text_markers = form.values(FieldKind::LongText);
    payload.text_markers = form.selected_markers().to_vec();
    payload.numbers = form.values(FieldKind::Number);
    payload.ranges = form.values(FieldKind::Range);
    payload.radio = form.radio(&config.radio_separator);
    payload.checkboxes = form.checkboxes(&config.checkbox_separator);

    tracing::debug!(
        chunks = payload.chunks.len(),
        relations = payload.relations.len(),
        "assembled submission payload"
    );
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Layout;
    use crate::form::FormField;
    use crate::marker::{Direction, RelationRule};
    use crate::node::DomRange;
    use crate::plugin::{CommentPlugin, Target};
    use crate::relation::{mark_relation, ActiveLabel};
    use crate::span::Span;

    fn marked(id: u32, code: &str, submittable: bool) -> Chunk {
        let mut chunk = Chunk::pending(Span::new(id as usize, id as usize + 1), DomRange::default());
        chunk.id = Some(LabelId::from_raw(id));
        chunk.label = Some(code.into());
        chunk.marked = true;
        chunk.submittable = submittable;
        chunk
    }

    #[test]
    fn test_only_submittable_chunks() {
        let mut chunks = ChunkList::new();
        chunks.push_marked(marked(1, "PER", false));
        chunks.push_marked(marked(2, "PER_2", true));
        let mut deleted = marked(3, "LOC", true);
        deleted.deleted = true;
        chunks.push_marked(deleted);

        let payload = assemble(
            &chunks,
            &RelationMap::default(),
            &FormState::new(),
            &PluginRegistry::new(),
            &SessionConfig::REGULAR,
        );
        let ids: Vec<_> = payload.chunks.iter().filter_map(|c| c.id).collect();
        assert_eq!(ids, vec![LabelId::from_raw(2)]);
        assert_eq!(payload.marker_groups["PER"], vec![LabelId::from_raw(2)]);
    }

    #[test]
    fn test_plugin_values_and_forms() {
        let mut chunks = ChunkList::new();
        chunks.push_marked(marked(1, "PER", true));
        chunks.push_marked(marked(2, "ORG", true));

        let mut relations = RelationMap::new(Layout::List);
        let rule = RelationRule::new("works", &[("PER", "ORG")], Direction::Forward);
        let active = [
            ActiveLabel::new(LabelId::from_raw(1), "PER", 1),
            ActiveLabel::new(LabelId::from_raw(2), "ORG", 2),
        ];
        let id = mark_relation(&mut relations, &rule, &active, None).unwrap().id;

        let mut plugins = PluginRegistry::new().with(CommentPlugin);
        plugins.set_value("comment", Target::Label(LabelId::from_raw(1), "PER"), "boss");
        plugins.set_value("comment", Target::Relation(id), "since 2019");

        let mut form = FormState::new()
            .field(FormField::new("AGE", FieldKind::Number))
            .field(FormField::option("OK", FieldKind::Radio, "yes"));
        form.set_value("AGE", "41");
        form.check("OK", "yes");

        let payload = assemble(&chunks, &relations, &form, &plugins, &SessionConfig::REGULAR);
        assert_eq!(payload.chunks[0].extra.get("comment").map(String::as_str), Some("boss"));
        assert_eq!(payload.relations.len(), 1);
        assert_eq!(payload.relations[0].rule, "works");
        assert_eq!(payload.relations[0].extra.get("comment").map(String::as_str), Some("since 2019"));
        assert_eq!(payload.numbers["AGE"].value, "41");
        assert_eq!(payload.radio["OK"].value, "yes");
        assert!(!payload.is_empty());

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["relations"][0]["links"][0]["s"], 1);
        assert_eq!(json["chunks"][0]["start"], 1);
    }
}
