//! Half-open character spans over the logical document text
//!
//! A `Span` is the offset-addressed identity of an annotation: `start` is
//! inclusive, `end` exclusive, both counted in characters of
//! [`Document::plain_text`](crate::node::Document::plain_text).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Half-open `[start, end)` character span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a span. `start > end` is normalized by swapping.
    pub const fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// Number of characters covered
    #[inline]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the span covers nothing
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if `offset` lies inside the span
    #[inline]
    pub const fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Check if `other` lies fully inside this span
    #[inline]
    pub const fn encloses(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Check if the two spans share at least one character
    #[inline]
    pub const fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check if the spans overlap without one enclosing the other
    pub const fn crosses(&self, other: &Span) -> bool {
        self.overlaps(other) && !self.encloses(other) && !other.encloses(self)
    }

    /// Smallest span covering both
    pub fn union(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Restoration ordering: ascending start, longest first on ties.
    ///
    /// Guarantees enclosing spans come before the spans they enclose.
    pub fn restore_order(&self, other: &Span) -> std::cmp::Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| other.len().cmp(&self.len()))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_normalizes() {
        let span = Span::new(7, 3);
        assert_eq!(span, Span { start: 3, end: 7 });
        assert_eq!(span.len(), 4);
    }

    #[test]
    fn test_span_relations() {
        let outer = Span::new(0, 23);
        let inner = Span::new(0, 5);
        let crossing = Span::new(3, 30);

        assert!(outer.encloses(&inner));
        assert!(!inner.encloses(&outer));
        assert!(outer.crosses(&crossing));
        assert!(!outer.crosses(&inner));
        assert!(!Span::new(0, 5).overlaps(&Span::new(5, 9)));
    }

    #[test]
    fn test_restore_order_puts_outer_first() {
        let mut spans = vec![Span::new(0, 5), Span::new(10, 13), Span::new(0, 23)];
        spans.sort_by(Span::restore_order);
        assert_eq!(spans, vec![Span::new(0, 23), Span::new(0, 5), Span::new(10, 13)]);
    }
}
