//! Relations between labeled spans
//!
//! # Architecture
//!
//! ```text
//! active labels ──► builder::mark_relation ──► RelationMap (dense ids 1..=K)
//!                                                   │
//!                                                   ├──► badges (number or "+")
//!                                                   └──► graph::Graph (layout)
//! ```
//!
//! Relation ids are slot indexes plus one. Removing a relation shifts every
//! later relation down and returns a [`Remap`] so callers can translate ids
//! they hold (current view, plugin storage keys).

pub mod builder;
pub mod graph;

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub use builder::{change_relation, mark_relation, remove_relation, ActiveLabel, RelationOutcome};
pub use graph::{Graph, GraphNode};

use crate::config::Layout;
use crate::id::{LabelId, RelationId};
use crate::marker::{Direction, TypePair};

// =============================================================================
// Link and Member
// =============================================================================

/// Submittable edge between two chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub s: LabelId,
    pub t: LabelId,
}

impl Link {
    pub const fn new(s: LabelId, t: LabelId) -> Self {
        Self { s, t }
    }

    /// Same edge in the other direction
    pub const fn mirror(self) -> Self {
        Self { s: self.t, t: self.s }
    }

    #[inline]
    pub fn touches(&self, id: LabelId) -> bool {
        self.s == id || self.t == id
    }
}

/// A label taking part in a relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: LabelId,
    /// Marker base code
    pub code: CompactString,
}

// =============================================================================
// Relation
// =============================================================================

/// Two or more labels linked under one rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Rule identifier
    pub rule: CompactString,
    pub name: String,
    /// Marker pair this relation connects
    pub between: TypePair,
    pub direction: Direction,
    pub members: Vec<Member>,
    pub links: Vec<Link>,
    #[serde(skip)]
    pub graph: Graph,
}

impl Relation {
    /// Check if a label is a member
    pub fn contains(&self, id: LabelId) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    /// Sorted member ids
    pub fn member_ids(&self) -> SmallVec<[LabelId; 8]> {
        let mut ids: SmallVec<[LabelId; 8]> = self.members.iter().map(|m| m.id).collect();
        ids.sort();
        ids
    }

    /// Render target identifier, derived from the member id range
    pub fn graph_id(&self) -> String {
        let ids = self.member_ids();
        match (ids.first(), ids.last()) {
            (Some(lo), Some(hi)) => format!("rel-{lo}-{hi}"),
            _ => "rel-empty".to_owned(),
        }
    }

    /// Check if both relations connect the same marker pair (order-insensitive)
    pub fn same_pair(&self, other: &Relation) -> bool {
        let (a, b) = &self.between;
        let (c, d) = &other.between;
        (a == c && b == d) || (a == d && b == c)
    }

    /// Add a link, skipping duplicates (and mirrors when bidirectional)
    ///
    /// Returns whether the link was new.
    pub fn add_link(&mut self, link: Link) -> bool {
        if link.s == link.t || has_link(&self.links, link, self.direction.is_bidirectional()) {
            return false;
        }
        self.links.push(link);
        true
    }

    /// Add a member unless present
    pub fn add_member(&mut self, id: LabelId, code: &str) {
        if !self.contains(id) {
            self.members.push(Member { id, code: code.into() });
        }
    }

    /// Drop a label with all its links; members left without links go too
    pub fn remove_label(&mut self, id: LabelId) -> bool {
        let before = self.links.len();
        self.links.retain(|l| !l.touches(id));
        let links = &self.links;
        self.members.retain(|m| m.id != id && links.iter().any(|l| l.touches(m.id)));
        self.links.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Recompute the presentation graph
    pub fn refresh_graph(&mut self, layout: Layout) {
        self.graph = Graph::build(&self.members, &self.links, &self.between, self.direction, layout);
    }
}

pub(crate) fn has_link(links: &[Link], link: Link, undirected: bool) -> bool {
    links.iter().any(|&l| l == link || (undirected && l == link.mirror()))
}

// =============================================================================
// Remap
// =============================================================================

/// Id translation after relations were removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remap {
    moved: FxHashMap<RelationId, RelationId>,
    removed: SmallVec<[RelationId; 2]>,
}

impl Remap {
    /// New id of `id`; `None` if the relation was removed
    pub fn get(&self, id: RelationId) -> Option<RelationId> {
        if self.removed.contains(&id) {
            return None;
        }
        Some(self.moved.get(&id).copied().unwrap_or(id))
    }

    /// Relations that moved (old id to new id)
    pub fn moved(&self) -> impl Iterator<Item = (RelationId, RelationId)> + '_ {
        self.moved.iter().map(|(&old, &new)| (old, new))
    }

    pub fn removed(&self) -> &[RelationId] {
        &self.removed
    }

    /// Check if nothing changed
    pub fn is_identity(&self) -> bool {
        self.moved.is_empty() && self.removed.is_empty()
    }
}

// =============================================================================
// RelationMap
// =============================================================================

/// All relations of a session, densely numbered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationMap {
    relations: Vec<Relation>,
    layout: Layout,
}

impl RelationMap {
    pub fn new(layout: Layout) -> Self {
        Self {
            relations: Vec::new(),
            layout,
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn get(&self, id: RelationId) -> Option<&Relation> {
        self.relations.get(id.index())
    }

    pub fn get_mut(&mut self, id: RelationId) -> Option<&mut Relation> {
        self.relations.get_mut(id.index())
    }

    /// Relations with their ids, in id order
    pub fn iter(&self) -> impl Iterator<Item = (RelationId, &Relation)> {
        self.relations
            .iter()
            .enumerate()
            .map(|(i, r)| (RelationId::from_index(i), r))
    }

    /// Ids in use (always `1..=len`)
    pub fn ids(&self) -> impl Iterator<Item = RelationId> {
        (0..self.relations.len()).map(RelationId::from_index)
    }

    /// Relations a label belongs to
    pub fn relations_of(&self, label: LabelId) -> SmallVec<[RelationId; 4]> {
        self.iter().filter(|(_, r)| r.contains(label)).map(|(id, _)| id).collect()
    }

    /// Append a relation, returning its id
    pub fn insert(&mut self, mut relation: Relation) -> RelationId {
        relation.refresh_graph(self.layout);
        self.relations.push(relation);
        RelationId::from_index(self.relations.len() - 1)
    }

    /// Remove one relation and renumber the ones above it
    pub fn remove(&mut self, id: RelationId) -> Option<(Relation, Remap)> {
        if id.index() >= self.relations.len() {
            return None;
        }
        let remap = self.remap_without(&[id]);
        let relation = self.relations.remove(id.index());
        tracing::debug!(relation = %id, renumbered = remap.moved.len(), "removed relation");
        Some((relation, remap))
    }

    /// Remove several relations at once
    pub fn remove_all(&mut self, ids: &[RelationId]) -> Remap {
        let mut ids: SmallVec<[RelationId; 4]> =
            ids.iter().copied().filter(|id| id.index() < self.relations.len()).collect();
        ids.sort();
        ids.dedup();
        let remap = self.remap_without(&ids);
        // Highest first, so lower slots stay put
        for id in ids.iter().rev() {
            self.relations.remove(id.index());
        }
        if !ids.is_empty() {
            tracing::debug!(removed = ids.len(), renumbered = remap.moved.len(), "removed relations");
        }
        remap
    }

    /// Translation of current ids once `removed` are gone
    fn remap_without(&self, removed: &[RelationId]) -> Remap {
        let mut remap = Remap::default();
        for id in self.ids() {
            if removed.contains(&id) {
                remap.removed.push(id);
                continue;
            }
            let shift = removed.iter().filter(|&&r| r < id).count();
            if shift > 0 {
                remap.moved.insert(id, RelationId::from_index(id.index() - shift));
            }
        }
        remap
    }

    /// Drop a label from every relation, removing relations left without links
    pub fn remove_label(&mut self, label: LabelId) -> Remap {
        let mut emptied: SmallVec<[RelationId; 4]> = SmallVec::new();
        for (index, relation) in self.relations.iter_mut().enumerate() {
            if relation.remove_label(label) {
                if relation.is_empty() {
                    emptied.push(RelationId::from_index(index));
                } else {
                    relation.refresh_graph(self.layout);
                }
            }
        }
        self.remove_all(&emptied)
    }

    /// Relation badge per label: its relation id, or `+` when in several
    pub fn badges(&self) -> FxHashMap<LabelId, CompactString> {
        let mut counts: FxHashMap<LabelId, (RelationId, usize)> = FxHashMap::default();
        for (id, relation) in self.iter() {
            for member in &relation.members {
                counts.entry(member.id).and_modify(|e| e.1 += 1).or_insert((id, 1));
            }
        }
        counts
            .into_iter()
            .map(|(label, (id, count))| {
                let badge = if count > 1 {
                    CompactString::const_new("+")
                } else {
                    compact_str::format_compact!("{id}")
                };
                (label, badge)
            })
            .collect()
    }

    /// Drop every relation
    pub fn clear(&mut self) {
        self.relations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(links: &[(u32, u32)]) -> Relation {
        let mut rel = Relation {
            rule: "r1".into(),
            name: String::new(),
            between: ("PER".into(), "LOC".into()),
            direction: Direction::Forward,
            members: Vec::new(),
            links: Vec::new(),
            graph: Graph::default(),
        };
        for &(s, t) in links {
            let (s, t) = (LabelId::from_raw(s), LabelId::from_raw(t));
            rel.add_member(s, "PER");
            rel.add_member(t, "LOC");
            rel.add_link(Link::new(s, t));
        }
        rel
    }

    fn ids(map: &RelationMap) -> Vec<u32> {
        map.ids().map(|id| id.as_raw()).collect()
    }

    #[test]
    fn test_remove_renumbers_densely() {
        let mut map = RelationMap::new(Layout::List);
        for i in 0..4 {
            let id = map.insert(relation(&[(i * 2 + 1, i * 2 + 2)]));
            assert_eq!(id.as_raw(), i + 1);
        }
        let (_, remap) = map.remove(RelationId::from_raw(2)).unwrap();
        assert_eq!(ids(&map), vec![1, 2, 3]);
        assert_eq!(remap.get(RelationId::from_raw(1)), Some(RelationId::from_raw(1)));
        assert_eq!(remap.get(RelationId::from_raw(2)), None);
        assert_eq!(remap.get(RelationId::from_raw(4)), Some(RelationId::from_raw(3)));
        assert!(map.remove(RelationId::from_raw(9)).is_none());
    }

    #[test]
    fn test_remove_all_composes() {
        let mut map = RelationMap::new(Layout::List);
        for i in 0..5 {
            let _id = map.insert(relation(&[(i * 2 + 1, i * 2 + 2)]));
        }
        let remap = map.remove_all(&[RelationId::from_raw(4), RelationId::from_raw(2)]);
        assert_eq!(ids(&map), vec![1, 2, 3]);
        assert_eq!(remap.get(RelationId::from_raw(3)), Some(RelationId::from_raw(2)));
        assert_eq!(remap.get(RelationId::from_raw(5)), Some(RelationId::from_raw(3)));
        assert_eq!(remap.get(RelationId::from_raw(4)), None);
        assert_eq!(remap.get(RelationId::from_raw(2)), None);
        assert_eq!(map.get(RelationId::from_raw(3)).map(|r| r.links[0].s), Some(LabelId::from_raw(9)));
    }

    #[test]
    fn test_remove_label_dissolves_empty() {
        let mut map = RelationMap::new(Layout::Force);
        let first = map.insert(relation(&[(1, 2)]));
        let second = map.insert(relation(&[(3, 2), (5, 4)]));
        assert_eq!((first, second), (RelationId::FIRST, RelationId::from_raw(2)));
        let remap = map.remove_label(LabelId::from_raw(2));
        assert_eq!(ids(&map), vec![1]);
        assert_eq!(remap.get(RelationId::from_raw(2)), Some(RelationId::from_raw(1)));
        let rel = map.get(RelationId::FIRST).unwrap();
        assert_eq!(rel.links, vec![Link::new(LabelId::from_raw(5), LabelId::from_raw(4))]);
        assert_eq!(rel.member_ids().as_slice(), &[LabelId::from_raw(4), LabelId::from_raw(5)]);
    }

    #[test]
    fn test_badges() {
        let mut map = RelationMap::new(Layout::List);
        let _first = map.insert(relation(&[(1, 2)]));
        let _second = map.insert(relation(&[(1, 3)]));
        let badges = map.badges();
        assert_eq!(badges[&LabelId::from_raw(1)], "+");
        assert_eq!(badges[&LabelId::from_raw(2)], "1");
        assert_eq!(badges[&LabelId::from_raw(3)], "2");
    }

    #[test]
    fn test_bidirectional_suppresses_mirror() {
        let mut rel = relation(&[]);
        rel.direction = Direction::Bidirectional;
        let (a, b) = (LabelId::from_raw(1), LabelId::from_raw(2));
        assert!(rel.add_link(Link::new(a, b)));
        assert!(!rel.add_link(Link::new(b, a)));
        assert!(!rel.add_link(Link::new(a, a)));
        assert_eq!(rel.graph_id(), "rel-empty");
    }
}
