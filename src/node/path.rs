//! Node addressing: paths, boundaries and ranges
//!
//! A `NodePath` lists child indexes from the document root. A `Boundary`
//! is the DOM `(container, offset)` pair: a character offset when the
//! container is a text node, a child index when it is an element.

use std::fmt;

use smallvec::SmallVec;

/// Child indexes from the root element
pub type NodePath = SmallVec<[usize; 8]>;

/// Parent path of `path` (the root has no parent)
pub fn parent_of(path: &[usize]) -> Option<&[usize]> {
    path.split_last().map(|(_, parent)| parent)
}

/// Longest common prefix of two paths
pub fn common_prefix(a: &[usize], b: &[usize]) -> NodePath {
    a.iter()
        .zip(b.iter())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| *x)
        .collect()
}

/// Check if `ancestor` is a strict prefix of `path`
pub fn is_ancestor(ancestor: &[usize], path: &[usize]) -> bool {
    ancestor.len() < path.len() && path.starts_with(ancestor)
}

/// Append a child index to a path
pub fn child_path(path: &[usize], index: usize) -> NodePath {
    let mut out = NodePath::from_slice(path);
    out.push(index);
    out
}

// =============================================================================
// Boundary / DomRange
// =============================================================================

/// DOM-style boundary point
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Boundary {
    /// Path of the container node
    pub path: NodePath,
    /// Character offset (text container) or child index (element container)
    pub offset: usize,
}

impl Boundary {
    /// Create a boundary
    pub fn new(path: impl AsRef<[usize]>, offset: usize) -> Self {
        Self {
            path: NodePath::from_slice(path.as_ref()),
            offset,
        }
    }

    /// Boundary at a child index of the root element
    pub fn at_root(offset: usize) -> Self {
        Self {
            path: NodePath::new(),
            offset,
        }
    }

    /// Boundary just before the node at `path` (in its parent)
    pub fn before(path: &[usize]) -> Option<Self> {
        let (last, parent) = path.split_last()?;
        Some(Self::new(parent, *last))
    }

    /// Boundary just after the node at `path` (in its parent)
    pub fn after(path: &[usize]) -> Option<Self> {
        let (last, parent) = path.split_last()?;
        Some(Self::new(parent, *last + 1))
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.path.as_slice(), self.offset)
    }
}

/// DOM-style range between two boundaries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DomRange {
    pub start: Boundary,
    pub end: Boundary,
}

impl DomRange {
    /// Create a range
    pub fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    /// Check if both boundaries are the same point
    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for DomRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_helpers() {
        assert_eq!(parent_of(&[1, 2, 3]), Some(&[1, 2][..]));
        assert_eq!(parent_of(&[]), None);
        assert_eq!(common_prefix(&[0, 1, 4], &[0, 1, 2, 5]).as_slice(), &[0, 1]);
        assert!(is_ancestor(&[0], &[0, 3]));
        assert!(!is_ancestor(&[0, 3], &[0, 3]));
        assert_eq!(child_path(&[2], 7).as_slice(), &[2, 7]);
    }

    #[test]
    fn test_boundary_around_node() {
        assert_eq!(Boundary::before(&[0, 2]), Some(Boundary::new([0], 2)));
        assert_eq!(Boundary::after(&[0, 2]), Some(Boundary::new([0], 3)));
        assert_eq!(Boundary::before(&[]), None);
    }
}
