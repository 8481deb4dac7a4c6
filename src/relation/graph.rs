//! Presentation graph of a relation
//!
//! Node positions are computed here so every front end draws the same
//! picture: a vertical list per marker type, or a small spring embedder
//! (repulsion between all nodes, springs along links, gravity towards the
//! center, cooling temperature). Both layouts are deterministic.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::config::Layout;
use crate::id::LabelId;
use crate::marker::Direction;

use super::{Link, Member};

const ROW_GAP: f64 = 40.0;
const COLUMN_GAP: f64 = 160.0;

const IDEAL_EDGE_LENGTH: f64 = 80.0;
const GRAVITY: f64 = 0.05;
const ITERATIONS: usize = 120;
const INITIAL_TEMPERATURE: f64 = 40.0;
const COOLING_FACTOR: f64 = 0.95;
const MIN_DISTANCE: f64 = 0.01;

/// A positioned endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: LabelId,
    /// Marker base code
    pub code: CompactString,
    pub x: f64,
    pub y: f64,
}

/// Positioned nodes and links of one relation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<Link>,
    pub from: CompactString,
    pub to: CompactString,
    pub direction: Direction,
}

impl Graph {
    /// Lay out a relation's members and links
    pub fn build(members: &[Member], links: &[Link], between: &(CompactString, CompactString), direction: Direction, layout: Layout) -> Self {
        let mut nodes: Vec<GraphNode> = members
            .iter()
            .map(|m| GraphNode {
                id: m.id,
                code: m.code.clone(),
                x: 0.0,
                y: 0.0,
            })
            .collect();
        nodes.sort_by_key(|n| n.id);

        let (from, to) = between.clone();
        match layout {
            Layout::List => list_layout(&mut nodes, &from),
            Layout::Force => force_layout(&mut nodes, links),
        }

        Self {
            nodes,
            links: links.to_vec(),
            from,
            to,
            direction,
        }
    }

    /// Nodes of one marker type
    pub fn nodes_of<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a GraphNode> + 'a {
        self.nodes.iter().filter(move |n| n.code == code)
    }

    pub fn node(&self, id: LabelId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// One column per marker type: `from` type on the left
fn list_layout(nodes: &mut [GraphNode], from: &str) {
    let (mut left, mut right) = (0.0, 0.0);
    for node in nodes.iter_mut() {
        let row = if node.code == from { &mut left } else { &mut right };
        node.x = if node.code == from { 0.0 } else { COLUMN_GAP };
        node.y = *row;
        *row += ROW_GAP;
    }
}

fn force_layout(nodes: &mut [GraphNode], links: &[Link]) {
    let n = nodes.len();
    if n == 0 {
        return;
    }

    // Start on a circle, in id order
    let radius = (IDEAL_EDGE_LENGTH * n as f64 / std::f64::consts::TAU).max(IDEAL_EDGE_LENGTH / 2.0);
    for (i, node) in nodes.iter_mut().enumerate() {
        let angle = std::f64::consts::TAU * i as f64 / n as f64;
        node.x = radius * angle.cos();
        node.y = radius * angle.sin();
    }

    let edges: Vec<(usize, usize)> = links
        .iter()
        .filter_map(|link| {
            let s = nodes.iter().position(|node| node.id == link.s)?;
            let t = nodes.iter().position(|node| node.id == link.t)?;
            Some((s, t))
        })
        .collect();

    let k = IDEAL_EDGE_LENGTH;
    let mut temperature = INITIAL_TEMPERATURE;
    let mut force = vec![(0.0f64, 0.0f64); n];
    for _ in 0..ITERATIONS {
        force.iter_mut().for_each(|f| *f = (0.0, 0.0));

        for i in 0..n {
            for j in (i + 1)..n {
                let (dx, dy) = (nodes[i].x - nodes[j].x, nodes[i].y - nodes[j].y);
                let dist = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
                let push = k * k / dist;
                let (fx, fy) = (dx / dist * push, dy / dist * push);
                force[i].0 += fx;
                force[i].1 += fy;
                force[j].0 -= fx;
                force[j].1 -= fy;
            }
        }

        for &(s, t) in &edges {
            let (dx, dy) = (nodes[s].x - nodes[t].x, nodes[s].y - nodes[t].y);
            let dist = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
            let pull = dist * dist / k;
            let (fx, fy) = (dx / dist * pull, dy / dist * pull);
            force[s].0 -= fx;
            force[s].1 -= fy;
            force[t].0 += fx;
            force[t].1 += fy;
        }

        for (node, (fx, fy)) in nodes.iter_mut().zip(&force) {
            let (fx, fy) = (fx - GRAVITY * node.x, fy - GRAVITY * node.y);
            let len = (fx * fx + fy * fy).sqrt();
            if len > MIN_DISTANCE {
                let step = len.min(temperature);
                node.x += fx / len * step;
                node.y += fy / len * step;
            }
        }
        temperature *= COOLING_FACTOR;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: u32, code: &str) -> Member {
        Member {
            id: LabelId::from_raw(id),
            code: code.into(),
        }
    }

    fn link(s: u32, t: u32) -> Link {
        Link::new(LabelId::from_raw(s), LabelId::from_raw(t))
    }

    #[test]
    fn test_list_layout_columns() {
        let members = [member(3, "PER"), member(1, "PER"), member(2, "LOC")];
        let graph = Graph::build(
            &members,
            &[link(1, 2), link(3, 2)],
            &("PER".into(), "LOC".into()),
            Direction::Forward,
            Layout::List,
        );
        let per: Vec<_> = graph.nodes_of("PER").map(|n| (n.id.as_raw(), n.x, n.y)).collect();
        assert_eq!(per, vec![(1, 0.0, 0.0), (3, 0.0, ROW_GAP)]);
        let loc = graph.node(LabelId::from_raw(2)).unwrap();
        assert_eq!((loc.x, loc.y), (COLUMN_GAP, 0.0));
    }

    #[test]
    fn test_force_layout_is_deterministic_and_spread() {
        let members = [member(1, "PER"), member(2, "LOC"), member(3, "PER")];
        let links = [link(1, 2), link(3, 2)];
        let pair = ("PER".into(), "LOC".into());
        let a = Graph::build(&members, &links, &pair, Direction::Bidirectional, Layout::Force);
        let b = Graph::build(&members, &links, &pair, Direction::Bidirectional, Layout::Force);
        assert_eq!(a, b);

        for (i, p) in a.nodes.iter().enumerate() {
            assert!(p.x.is_finite() && p.y.is_finite());
            for q in &a.nodes[i + 1..] {
                let dist = ((p.x - q.x).powi(2) + (p.y - q.y).powi(2)).sqrt();
                assert!(dist > 1.0, "nodes {} and {} overlap", p.id, q.id);
            }
        }
    }
}
