//! Relation construction and editing
//!
//! [`mark_relation`] links the active labels under a rule:
//!
//! 1. partition active labels by marker base code
//! 2. reject an exact duplicate of an existing relation
//! 3. join the lowest compatible relation the labels already belong to,
//!    migrating any other implicated relation into it
//! 4. bidirectional rules also connect against the joined relation's members
//! 5. build edges per type pair, never self-loops
//! 6. fail when no edge results
//! 7. persist deduplicated links and refresh the graph

use compact_str::CompactString;
use smallvec::SmallVec;

use crate::error::RelationError;
use crate::id::{LabelId, RelationId};
use crate::marker::{base_code, Direction, RelationRule};

use super::{has_link, Link, Member, Relation, RelationMap, Remap};

/// A clicked label, stamped with the selection clock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveLabel {
    pub id: LabelId,
    /// Marker code (variant suffix allowed)
    pub code: CompactString,
    /// Selection order
    pub clock: u64,
}

impl ActiveLabel {
    pub fn new(id: LabelId, code: impl Into<CompactString>, clock: u64) -> Self {
        Self {
            id,
            code: code.into(),
            clock,
        }
    }
}

/// Result of [`mark_relation`]
#[derive(Debug, Clone, PartialEq)]
pub struct RelationOutcome {
    /// Relation that received the links (after renumbering)
    pub id: RelationId,
    /// A new relation was created
    pub created: bool,
    /// Links added
    pub added: usize,
    /// Renumbering caused by merged relations
    pub remap: Remap,
}

/// Endpoint under consideration
#[derive(Debug, Clone)]
struct Endpoint {
    id: LabelId,
    code: CompactString,
    clock: u64,
}

/// Link the active labels under `rule`
///
/// `current` is the relation on view; when compatible it is joined even if
/// none of the active labels belongs to it yet.
pub fn mark_relation(
    map: &mut RelationMap,
    rule: &RelationRule,
    active: &[ActiveLabel],
    current: Option<RelationId>,
) -> Result<RelationOutcome, RelationError> {
    // 1. Partition (dedupe by id, base codes)
    let mut endpoints: SmallVec<[Endpoint; 8]> = SmallVec::new();
    for label in active {
        if !endpoints.iter().any(|e| e.id == label.id) {
            endpoints.push(Endpoint {
                id: label.id,
                code: base_code(&label.code).into(),
                clock: label.clock,
            });
        }
    }
    if endpoints.len() < 2 {
        return Err(RelationError::TooFewLabels { count: endpoints.len() });
    }

    // 2. Exact duplicate
    let mut selected: SmallVec<[LabelId; 8]> = endpoints.iter().map(|e| e.id).collect();
    selected.sort();
    if let Some((id, _)) = map
        .iter()
        .find(|(_, r)| r.rule == rule.id && r.member_ids() == selected)
    {
        return Err(RelationError::Duplicate(id));
    }

    // 3. Implicated relations, lowest first
    let mut implicated: SmallVec<[RelationId; 4]> = map
        .iter()
        .filter(|(_, r)| r.rule == rule.id && endpoints.iter().any(|e| r.contains(e.id)))
        .map(|(id, _)| id)
        .collect();
    if let Some(current) = current
        && map.get(current).is_some_and(|r| r.rule == rule.id)
        && !implicated.contains(&current)
    {
        implicated.push(current);
    }
    implicated.sort();

    // 4. Bidirectional joins connect against the full membership
    if rule.direction.is_bidirectional() {
        for &id in &implicated {
            let Some(relation) = map.get(id) else { continue };
            for member in &relation.members {
                if !endpoints.iter().any(|e| e.id == member.id) {
                    endpoints.push(Endpoint {
                        id: member.id,
                        code: member.code.clone(),
                        clock: 0,
                    });
                }
            }
        }
    }

    // 5. Edges per type pair
    let mut links: Vec<Link> = Vec::new();
    let mut pair = None;
    for (a, b) in &rule.between {
        let found = connect(&endpoints, a, b, rule.direction, &mut links);
        if found && pair.is_none() {
            pair = Some((a.clone(), b.clone()));
        }
    }

    // 6. Nothing to link
    let Some(between) = pair else {
        return Err(RelationError::NoEdges { rule: rule.id.to_string() });
    };

    // 7. Persist
    let code_of = |id: LabelId| endpoints.iter().find(|e| e.id == id).map(|e| e.code.clone());
    let Some((&dest, extras)) = implicated.split_first() else {
        let mut relation = Relation {
            rule: rule.id.clone(),
            name: rule.name.clone(),
            between,
            direction: rule.direction,
            members: Vec::new(),
            links: Vec::new(),
            graph: Default::default(),
        };
        let added = extend(&mut relation, &links, code_of);
        let id = map.insert(relation);
        tracing::debug!(relation = %id, rule = %rule.id, links = added, "created relation");
        return Ok(RelationOutcome {
            id,
            created: true,
            added,
            remap: Remap::default(),
        });
    };

    // Migrate the other implicated relations into the destination
    let migrated: Vec<(Vec<Member>, Vec<Link>)> = extras
        .iter()
        .filter_map(|&id| map.get(id).map(|r| (r.members.clone(), r.links.clone())))
        .collect();
    let layout = map.layout();
    let Some(relation) = map.get_mut(dest) else {
        return Err(RelationError::UnknownRelation(dest));
    };
    let mut added = 0;
    for (members, old_links) in migrated {
        for member in &members {
            relation.add_member(member.id, &member.code);
        }
        for link in old_links {
            added += usize::from(relation.add_link(link));
        }
    }
    added += extend(relation, &links, code_of);
    if added == 0 {
        return Err(RelationError::Duplicate(dest));
    }
    relation.refresh_graph(layout);

    let remap = map.remove_all(extras);
    tracing::debug!(relation = %dest, merged = extras.len(), links = added, "extended relation");
    Ok(RelationOutcome {
        id: dest,
        created: false,
        added,
        remap,
    })
}

/// Build the edges of one `(a, b)` type pair into `links`
///
/// Directional rules between the same type follow the selection clock:
/// earlier to later for forward rules, later to earlier for backward ones.
fn connect(endpoints: &[Endpoint], a: &str, b: &str, direction: Direction, links: &mut Vec<Link>) -> bool {
    let (from, to) = match direction {
        Direction::Backward => (b, a),
        Direction::Forward | Direction::Bidirectional => (a, b),
    };
    let undirected = direction.is_bidirectional();

    let mut found = false;
    for f in endpoints.iter().filter(|e| e.code == from) {
        for t in endpoints.iter().filter(|e| e.code == to) {
            if f.id == t.id {
                continue;
            }
            if from == to && !undirected {
                let ordered = match direction {
                    Direction::Backward => f.clock > t.clock,
                    _ => f.clock < t.clock,
                };
                if !ordered {
                    continue;
                }
            }
            let link = Link::new(f.id, t.id);
            found = true;
            if !has_link(links, link, undirected) {
                links.push(link);
            }
        }
    }
    found
}

fn extend(relation: &mut Relation, links: &[Link], code_of: impl Fn(LabelId) -> Option<CompactString>) -> usize {
    let mut added = 0;
    for &link in links {
        if relation.add_link(link) {
            added += 1;
            for id in [link.s, link.t] {
                if let Some(code) = code_of(id) {
                    relation.add_member(id, &code);
                }
            }
        }
    }
    added
}

// =============================================================================
// Editing
// =============================================================================

/// Move a label between relations, or into or out of one
///
/// Both relations must connect the same marker pair. A source relation
/// left without links is removed; the returned remap translates ids.
pub fn change_relation(
    map: &mut RelationMap,
    label: LabelId,
    code: &str,
    from: Option<RelationId>,
    to: Option<RelationId>,
) -> Result<Remap, RelationError> {
    if from == to {
        return Ok(Remap::default());
    }
    let source = from
        .map(|id| map.get(id).ok_or(RelationError::UnknownRelation(id)))
        .transpose()?;
    let dest = to
        .map(|id| map.get(id).ok_or(RelationError::UnknownRelation(id)))
        .transpose()?;

    if let (Some(source), Some(dest), Some(from), Some(to)) = (source, dest, from, to)
        && !source.same_pair(dest)
    {
        return Err(RelationError::CrossType { from, to });
    }
    if let (Some(source), Some(from)) = (source, from)
        && !source.contains(label)
    {
        return Err(RelationError::NotMember { label, relation: from });
    }

    let code = base_code(code);
    let new_links = match dest {
        Some(dest) => {
            let links = links_into(dest, label, code);
            if links.is_empty() {
                return Err(RelationError::NoEdges { rule: dest.rule.to_string() });
            }
            links
        }
        None => Vec::new(),
    };

    let layout = map.layout();
    if let Some(relation) = to.and_then(|id| map.get_mut(id)) {
        for link in new_links {
            relation.add_link(link);
        }
        relation.add_member(label, code);
        relation.refresh_graph(layout);
    }

    let Some(from) = from else {
        return Ok(Remap::default());
    };
    let emptied = match map.get_mut(from) {
        Some(relation) => {
            relation.remove_label(label);
            relation.refresh_graph(layout);
            relation.is_empty()
        }
        None => false,
    };
    tracing::debug!(%label, ?from, ?to, "moved label between relations");
    Ok(if emptied { map.remove_all(&[from]) } else { Remap::default() })
}

/// Links connecting `label` to the members of `dest`
fn links_into(dest: &Relation, label: LabelId, code: &str) -> Vec<Link> {
    let (a, b) = (dest.between.0.as_str(), dest.between.1.as_str());
    let mut links = Vec::new();
    for member in dest.members.iter().filter(|m| m.id != label) {
        let other = member.code.as_str();
        let link = match dest.direction {
            // The moved label counts as the latest selection
            _ if a == b && code == a && other == a => match dest.direction {
                Direction::Backward => Link::new(label, member.id),
                _ => Link::new(member.id, label),
            },
            Direction::Bidirectional if dest.between_matches(code, other) => Link::new(label, member.id),
            Direction::Forward if code == a && other == b => Link::new(label, member.id),
            Direction::Forward if code == b && other == a => Link::new(member.id, label),
            Direction::Backward if code == b && other == a => Link::new(label, member.id),
            Direction::Backward if code == a && other == b => Link::new(member.id, label),
            _ => continue,
        };
        links.push(link);
    }
    links
}

impl Relation {
    fn between_matches(&self, x: &str, y: &str) -> bool {
        let (a, b) = (&self.between.0, &self.between.1);
        (a == x && b == y) || (a == y && b == x)
    }
}

/// Dissolve a relation, renumbering the ones above it
pub fn remove_relation(map: &mut RelationMap, id: RelationId) -> Result<(Relation, Remap), RelationError> {
    map.remove(id).ok_or(RelationError::UnknownRelation(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Layout;

    fn active(id: u32, code: &str, clock: u64) -> ActiveLabel {
        ActiveLabel::new(LabelId::from_raw(id), code, clock)
    }

    fn lid(id: u32) -> LabelId {
        LabelId::from_raw(id)
    }

    fn rid(id: u32) -> RelationId {
        RelationId::from_raw(id)
    }

    #[test]
    fn test_create_forward_relation() {
        let mut map = RelationMap::new(Layout::List);
        let rule = RelationRule::new("works", &[("PER", "ORG")], Direction::Forward);
        let out = mark_relation(&mut map, &rule, &[active(2, "ORG", 1), active(1, "PER_1", 2)], None).unwrap();
        assert!(out.created);
        assert_eq!(out.id, RelationId::FIRST);
        let rel = map.get(out.id).unwrap();
        assert_eq!(rel.links, vec![Link::new(lid(1), lid(2))]);
        assert_eq!(rel.member_ids().as_slice(), &[lid(1), lid(2)]);
        assert_eq!(rel.graph.nodes.len(), 2);
    }

    #[test]
    fn test_backward_reverses() {
        let mut map = RelationMap::new(Layout::List);
        let rule = RelationRule::new("r", &[("PER", "ORG")], Direction::Backward);
        mark_relation(&mut map, &rule, &[active(1, "PER", 1), active(2, "ORG", 2)], None).unwrap();
        assert_eq!(map.get(rid(1)).unwrap().links, vec![Link::new(lid(2), lid(1))]);
    }

    #[test]
    fn test_same_type_follows_selection_order() {
        let mut map = RelationMap::new(Layout::List);
        let rule = RelationRule::new("coref", &[("PER", "PER")], Direction::Forward);
        mark_relation(&mut map, &rule, &[active(5, "PER", 2), active(3, "PER", 1)], None).unwrap();
        assert_eq!(map.get(rid(1)).unwrap().links, vec![Link::new(lid(3), lid(5))]);
    }

    #[test]
    fn test_bidirectional_no_self_loops_no_mirrors() {
        let mut map = RelationMap::new(Layout::Force);
        let rule = RelationRule::new("sib", &[("PER", "PER")], Direction::Bidirectional);
        let labels = [active(1, "PER", 1), active(2, "PER", 2), active(3, "PER", 3)];
        mark_relation(&mut map, &rule, &labels, None).unwrap();
        let links = &map.get(rid(1)).unwrap().links;
        assert_eq!(links.len(), 3);
        assert!(links.iter().all(|l| l.s != l.t));
        for l in links {
            assert!(!links.contains(&l.mirror()));
        }
    }

    #[test]
    fn test_rejects_too_few_and_no_edges() {
        let mut map = RelationMap::new(Layout::List);
        let rule = RelationRule::new("r", &[("PER", "ORG")], Direction::Forward);
        assert_eq!(
            mark_relation(&mut map, &rule, &[active(1, "PER", 1)], None),
            Err(RelationError::TooFewLabels { count: 1 })
        );
        assert_eq!(
            mark_relation(&mut map, &rule, &[active(1, "PER", 1), active(2, "PER", 2)], None),
            Err(RelationError::NoEdges { rule: "r".into() })
        );
        assert!(map.is_empty());
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let mut map = RelationMap::new(Layout::List);
        let rule = RelationRule::new("r", &[("PER", "ORG")], Direction::Forward);
        let labels = [active(1, "PER", 1), active(2, "ORG", 2)];
        mark_relation(&mut map, &rule, &labels, None).unwrap();
        assert_eq!(
            mark_relation(&mut map, &rule, &labels, None),
            Err(RelationError::Duplicate(rid(1)))
        );
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_joining_merges_relations() {
        let mut map = RelationMap::new(Layout::List);
        let rule = RelationRule::new("r", &[("PER", "ORG")], Direction::Forward);
        mark_relation(&mut map, &rule, &[active(1, "PER", 1), active(2, "ORG", 2)], None).unwrap();
        mark_relation(&mut map, &rule, &[active(3, "PER", 3), active(4, "ORG", 4)], None).unwrap();
        let other = RelationRule::new("x", &[("LOC", "LOC")], Direction::Bidirectional);
        mark_relation(&mut map, &other, &[active(7, "LOC", 5), active(8, "LOC", 6)], None).unwrap();

        // Links PER 1 (relation 1) with ORG 4 (relation 2)
        let out = mark_relation(&mut map, &rule, &[active(1, "PER", 7), active(4, "ORG", 8)], None).unwrap();
        assert_eq!(out.id, rid(1));
        assert!(!out.created);
        assert_eq!(out.remap.get(rid(2)), None);
        assert_eq!(out.remap.get(rid(3)), Some(rid(2)));
        assert_eq!(map.len(), 2);
        let rel = map.get(rid(1)).unwrap();
        assert_eq!(rel.links.len(), 3);
        assert_eq!(rel.member_ids().as_slice(), &[lid(1), lid(2), lid(3), lid(4)]);
        assert_eq!(map.get(rid(2)).map(|r| r.rule.as_str()), Some("x"));
    }

    #[test]
    fn test_bidirectional_join_uses_full_membership() {
        let mut map = RelationMap::new(Layout::List);
        let rule = RelationRule::new("sib", &[("PER", "PER")], Direction::Bidirectional);
        mark_relation(&mut map, &rule, &[active(1, "PER", 1), active(2, "PER", 2)], None).unwrap();
        mark_relation(&mut map, &rule, &[active(2, "PER", 3), active(3, "PER", 4)], None).unwrap();
        let rel = map.get(rid(1)).unwrap();
        // 1-2 existing, 2-3 new, 1-3 from the pulled-in member
        assert_eq!(rel.links.len(), 3);
    }

    #[test]
    fn test_change_relation() {
        let mut map = RelationMap::new(Layout::List);
        let rule = RelationRule::new("r", &[("PER", "ORG")], Direction::Forward);
        let other = RelationRule::new("x", &[("LOC", "LOC")], Direction::Bidirectional);
        mark_relation(&mut map, &rule, &[active(1, "PER", 1), active(2, "ORG", 2)], None).unwrap();
        mark_relation(&mut map, &other, &[active(7, "LOC", 3), active(8, "LOC", 4)], None).unwrap();
        mark_relation(&mut map, &rule, &[active(3, "PER", 5), active(4, "ORG", 6)], None).unwrap();

        assert_eq!(
            change_relation(&mut map, lid(1), "PER", Some(rid(1)), Some(rid(2))),
            Err(RelationError::CrossType { from: rid(1), to: rid(2) })
        );
        assert_eq!(
            change_relation(&mut map, lid(9), "PER", Some(rid(1)), Some(rid(3))),
            Err(RelationError::NotMember { label: lid(9), relation: rid(1) })
        );

        // Moving PER 1 empties relation 1, so 2 and 3 shift down
        let remap = change_relation(&mut map, lid(1), "PER", Some(rid(1)), Some(rid(3))).unwrap();
        assert_eq!(remap.get(rid(3)), Some(rid(2)));
        assert_eq!(map.len(), 2);
        let rel = map.get(rid(2)).unwrap();
        assert!(rel.links.contains(&Link::new(lid(1), lid(4))));
        assert!(rel.contains(lid(1)));
    }

    #[test]
    fn test_dense_ids_after_removals() {
        let mut map = RelationMap::new(Layout::List);
        let rule = RelationRule::new("r", &[("PER", "ORG")], Direction::Forward);
        for i in 0..4u32 {
            let labels = [active(i * 2 + 1, "PER", 1), active(i * 2 + 2, "ORG", 2)];
            mark_relation(&mut map, &rule, &labels, None).unwrap();
        }
        remove_relation(&mut map, rid(1)).unwrap();
        remove_relation(&mut map, rid(2)).unwrap();
        assert!(remove_relation(&mut map, rid(5)).is_err());
        let ids: Vec<u32> = map.ids().map(|id| id.as_raw()).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
