//! Restoration order
//!
//! Phase one of restoration: the nesting forest of all span labels, built
//! from offsets alone. Nodes come out in pre-order (ancestors before
//! descendants, left to right), which is the order labels are replayed in.

use crate::span::Span;

/// One label in the nesting forest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanNode {
    /// Index into the input slice
    pub index: usize,
    pub span: Span,
    /// Number of enclosing spans
    pub depth: usize,
    /// Input index of the innermost enclosing span
    pub parent: Option<usize>,
}

/// Replay order of a set of span labels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestorePlan {
    nodes: Vec<PlanNode>,
    crossing: Vec<(usize, usize)>,
}

impl RestorePlan {
    /// Build the plan for `spans`
    ///
    /// Spans are sorted by [`Span::restore_order`]; equal spans keep their
    /// input order. A stack of open ancestors yields each span's parent.
    /// Same-level overlaps that are not nested are recorded as crossing
    /// pairs and placed as siblings.
    pub fn build(spans: &[Span]) -> Self {
        let mut order: Vec<usize> = (0..spans.len()).collect();
        order.sort_by(|&a, &b| spans[a].restore_order(&spans[b]).then(a.cmp(&b)));

        let mut nodes: Vec<PlanNode> = Vec::with_capacity(spans.len());
        let mut crossing = Vec::new();
        let mut stack: Vec<usize> = Vec::new();

        for index in order {
            let span = spans[index];
            while let Some(&top) = stack.last() {
                let open = nodes[top];
                if open.span.encloses(&span) {
                    break;
                }
                if open.span.overlaps(&span) {
                    crossing.push((open.index, index));
                }
                stack.pop();
            }

            let parent = stack.last().map(|&top| nodes[top].index);
            stack.push(nodes.len());
            nodes.push(PlanNode {
                index,
                span,
                depth: stack.len() - 1,
                parent,
            });
        }

        tracing::trace!(labels = nodes.len(), crossing = crossing.len(), "built restore plan");
        Self { nodes, crossing }
    }

    /// Nodes in replay order
    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    /// Input indexes in replay order
    pub fn order(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().map(|n| n.index)
    }

    /// Pairs of input indexes whose spans overlap without nesting
    pub fn crossing(&self) -> &[(usize, usize)] {
        &self.crossing
    }

    /// Input indexes of spans directly enclosed by `parent`
    pub fn children(&self, parent: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .filter(move |n| n.parent == Some(parent))
            .map(|n| n.index)
    }

    /// Input indexes of spans with no enclosing span
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().filter(|n| n.parent.is_none()).map(|n| n.index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outer_before_inner() {
        let spans = [Span::new(0, 5), Span::new(0, 23), Span::new(17, 22)];
        let plan = RestorePlan::build(&spans);
        assert_eq!(plan.order().collect::<Vec<_>>(), vec![1, 0, 2]);
        assert_eq!(plan.roots().collect::<Vec<_>>(), vec![1]);
        assert_eq!(plan.children(1).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(plan.nodes()[1].depth, 1);
        assert!(plan.crossing().is_empty());
    }

    #[test]
    fn test_deep_nesting_and_siblings() {
        // [0,30) > [2,20) > [4,8), then [10,12) under [2,20), then [25,28) under [0,30)
        let spans = [
            Span::new(25, 28),
            Span::new(4, 8),
            Span::new(0, 30),
            Span::new(10, 12),
            Span::new(2, 20),
        ];
        let plan = RestorePlan::build(&spans);
        let parents: Vec<_> = plan.nodes().iter().map(|n| (n.index, n.parent, n.depth)).collect();
        assert_eq!(
            parents,
            vec![
                (2, None, 0),
                (4, Some(2), 1),
                (1, Some(4), 2),
                (3, Some(4), 2),
                (0, Some(2), 1),
            ]
        );
    }

    #[test]
    fn test_crossing_recorded() {
        let spans = [Span::new(0, 9), Span::new(6, 13), Span::new(20, 25)];
        let plan = RestorePlan::build(&spans);
        assert_eq!(plan.crossing(), &[(0, 1)]);
        assert_eq!(plan.roots().count(), 3);
    }

    #[test]
    fn test_identical_spans_keep_input_order() {
        let spans = [Span::new(3, 7), Span::new(3, 7)];
        let plan = RestorePlan::build(&spans);
        assert_eq!(plan.order().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(plan.nodes()[1].parent, Some(0));
        assert!(RestorePlan::build(&[]).is_empty());
    }
}
