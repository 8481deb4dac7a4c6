//! Document type and related utilities
//!
//! The root container for the document tree, with path addressing,
//! query and traversal APIs.

use crate::id::LabelId;

use super::path::NodePath;
use super::{Element, Node, Text};

// =============================================================================
// Document
// =============================================================================

/// Root document container
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Root element (kind `Root`, contributes only its children)
    pub root: Element,
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Element::root())
    }
}

impl Document {
    /// Create a new document with a root element
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Build a document of plain paragraphs, one per line of `text`
    pub fn from_text(text: &str) -> Self {
        let mut root = Element::root();
        for line in text.split('\n') {
            root.push_elem(Element::paragraph().text(line));
        }
        Self::new(root)
    }

    /// Logical plain text (what offsets index into)
    pub fn plain_text(&self) -> String {
        self.root.plain_text()
    }

    /// Text content without chrome (DOM `textContent` equivalent)
    pub fn text_content(&self) -> String {
        self.root.text_content()
    }

    /// Length of the logical text in characters
    pub fn len(&self) -> usize {
        crate::offset::element_length(&self.root)
    }

    /// Check if the document holds no text
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Path addressing
    // ─────────────────────────────────────────────────────────────────────────

    /// Element at `path` (the empty path is the root)
    pub fn element_at(&self, path: &[usize]) -> Option<&Element> {
        let mut elem = &self.root;
        for &i in path {
            elem = elem.children.get(i)?.as_element()?;
        }
        Some(elem)
    }

    /// Mutable element at `path`
    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut elem = &mut self.root;
        for &i in path {
            elem = elem.children.get_mut(i)?.as_element_mut()?;
        }
        Some(elem)
    }

    /// Node at a non-empty `path`
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let (last, parent) = path.split_last()?;
        self.element_at(parent)?.children.get(*last)
    }

    /// Mutable node at a non-empty `path`
    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let (last, parent) = path.split_last()?;
        self.element_at_mut(parent)?.children.get_mut(*last)
    }

    /// Text node at `path`
    pub fn text_at(&self, path: &[usize]) -> Option<&Text> {
        self.node_at(path)?.as_text()
    }

    /// Paths of the enclosing elements of `path`, nearest first (root excluded)
    pub fn ancestors(&self, path: &[usize]) -> Vec<NodePath> {
        (1..path.len())
            .rev()
            .map(|len| NodePath::from_slice(&path[..len]))
            .collect()
    }

    /// Number of label elements enclosing the node at `path`
    pub fn label_depth(&self, path: &[usize]) -> usize {
        self.ancestors(path)
            .iter()
            .filter(|p| self.element_at(p).is_some_and(|e| e.kind.is_label()))
            .count()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query API
    // ─────────────────────────────────────────────────────────────────────────

    /// Find first element matching predicate (depth-first search)
    pub fn find_element<F>(&self, predicate: F) -> Option<&Element>
    where
        F: Fn(&Element) -> bool,
    {
        self.iter_elements().find(|e| predicate(e))
    }

    /// Find all elements matching predicate
    pub fn find_all<F>(&self, predicate: F) -> Vec<&Element>
    where
        F: Fn(&Element) -> bool,
    {
        self.iter_elements().filter(|e| predicate(e)).collect()
    }

    /// Iterate over all elements (depth-first, document order)
    pub fn iter_elements(&self) -> impl Iterator<Item = &Element> {
        ElementIterator::new(&self.root)
    }

    /// Paths of all elements matching predicate, in document order
    pub fn find_paths<F>(&self, predicate: F) -> Vec<NodePath>
    where
        F: Fn(&Element) -> bool,
    {
        let mut results = Vec::new();
        Self::collect_paths(&self.root, &mut NodePath::new(), &predicate, &mut results);
        results
    }

    fn collect_paths<F>(elem: &Element, path: &mut NodePath, predicate: &F, results: &mut Vec<NodePath>)
    where
        F: Fn(&Element) -> bool,
    {
        if predicate(elem) {
            results.push(path.clone());
        }
        for (i, child) in elem.children.iter().enumerate() {
            if let Some(child_elem) = child.as_element() {
                path.push(i);
                Self::collect_paths(child_elem, path, predicate, results);
                path.pop();
            }
        }
    }

    /// Visit all elements with a closure (mutable)
    pub fn for_each_element_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Element),
    {
        Self::visit_elements_mut_recursive(&mut self.root, &mut f);
    }

    fn visit_elements_mut_recursive<F>(elem: &mut Element, f: &mut F)
    where
        F: FnMut(&mut Element),
    {
        f(elem);
        for child in &mut elem.children {
            if let Some(child_elem) = child.as_element_mut() {
                Self::visit_elements_mut_recursive(child_elem, f);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Labels
    // ─────────────────────────────────────────────────────────────────────────

    /// Paths of all fragments of label `id`, in document order
    pub fn label_paths(&self, id: LabelId) -> Vec<NodePath> {
        self.find_paths(|e| e.is_label_of(id))
    }

    /// Path of the first fragment of label `id`
    pub fn first_label_path(&self, id: LabelId) -> Option<NodePath> {
        self.label_paths(id).into_iter().next()
    }

    /// Distinct label ids in document order of their first fragment
    pub fn label_ids(&self) -> Vec<LabelId> {
        let mut ids: Vec<LabelId> = Vec::new();
        for elem in self.iter_elements() {
            if let Some(id) = elem.label_id()
                && !ids.contains(&id)
            {
                ids.push(id);
            }
        }
        ids
    }

    /// Text content of all fragments of label `id`, concatenated
    pub fn label_text(&self, id: LabelId) -> String {
        self.label_paths(id)
            .iter()
            .filter(|p| !self.has_label_ancestor(p, id))
            .filter_map(|p| self.element_at(p))
            .map(Element::text_content)
            .collect()
    }

    /// Logical text of label `id`, implied newlines included
    pub fn label_plain_text(&self, id: LabelId) -> String {
        self.label_paths(id)
            .iter()
            .filter(|p| !self.has_label_ancestor(p, id))
            .filter_map(|p| self.element_at(p))
            .map(Element::plain_text)
            .collect()
    }

    /// Logical length of label `id` (fragments nested in the same label counted once)
    pub fn label_length(&self, id: LabelId) -> usize {
        self.label_paths(id)
            .iter()
            .filter(|p| !self.has_label_ancestor(p, id))
            .filter_map(|p| self.element_at(p))
            .map(crate::offset::element_length)
            .sum()
    }

    fn has_label_ancestor(&self, path: &[usize], id: LabelId) -> bool {
        self.ancestors(path)
            .iter()
            .any(|p| self.element_at(p).is_some_and(|e| e.is_label_of(id)))
    }

    /// Collect statistics about the document
    pub fn collect_stats(&self) -> Stats {
        let mut stats = Stats::default();
        Self::collect_stats_recursive(&self.root, &mut stats);
        stats
    }

    fn collect_stats_recursive(elem: &Element, stats: &mut Stats) {
        stats.element_count += 1;
        if elem.kind.is_label() {
            stats.label_count += 1;
        } else if elem.kind.is_block() || elem.kind.is_list() || elem.kind.is_quote() {
            stats.block_count += 1;
        }
        for child in &elem.children {
            match child {
                Node::Element(e) => Self::collect_stats_recursive(e, stats),
                Node::Text(_) => stats.text_count += 1,
            }
        }
    }
}

// =============================================================================
// ElementIterator - depth-first element traversal
// =============================================================================

/// Depth-first iterator over elements
pub struct ElementIterator<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> ElementIterator<'a> {
    fn new(root: &'a Element) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for ElementIterator<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let elem = self.stack.pop()?;
        // Push children in reverse order so they're visited left-to-right
        for child in elem.children.iter().rev() {
            if let Some(child_elem) = child.as_element() {
                self.stack.push(child_elem);
            }
        }
        Some(elem)
    }
}

// =============================================================================
// Stats - document statistics
// =============================================================================

/// Document statistics collected from traversal
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub element_count: usize,
    pub text_count: usize,
    pub label_count: usize,
    pub block_count: usize,
}
