//! Text node type
//!
//! Simple text content nodes in the document tree.

// =============================================================================
// Text
// =============================================================================

/// Text content node
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Text {
    /// Text content
    pub content: String,
}

impl Text {
    /// Create a new text node
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Check if text content is empty
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Get text length in characters (the unit of all document offsets)
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    /// Check if text is only whitespace
    pub fn is_whitespace(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Byte index of the character at `char_offset` (clamped to the end)
    pub fn byte_index(&self, char_offset: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_offset)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    /// Split at a character offset, keeping the head and returning the tail
    pub fn split_off(&mut self, char_offset: usize) -> Text {
        let at = self.byte_index(char_offset);
        Text::new(self.content.split_off(at))
    }

    /// Characters `[from, to)` as a string slice
    pub fn slice(&self, from: usize, to: usize) -> &str {
        let a = self.byte_index(from);
        let b = self.byte_index(to);
        &self.content[a..b.max(a)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_node() {
        let text = Text::new("  hello world  ");
        assert!(!text.is_empty());
        assert!(!text.is_whitespace());
        assert_eq!(text.len(), 15);
    }

    #[test]
    fn test_split_counts_chars_not_bytes() {
        let mut text = Text::new("Åsa möter");
        let tail = text.split_off(4);
        assert_eq!(text.content, "Åsa ");
        assert_eq!(tail.content, "möter");
        assert_eq!(tail.slice(1, 3), "öt");
    }
}
