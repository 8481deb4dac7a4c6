//! Attribute system for document elements
//!
//! - Direct `Vec<(String, String)>` for attributes
//! - `AttrsExt` adds lookup plus the class and `data-*` helpers the
//!   annotation markup relies on (`class="tag"`, `data-i`, `data-s`, ...)

/// Element attributes as simple key-value pairs
pub type Attrs = Vec<(String, String)>;

/// Extension trait for attribute operations on Attrs
pub trait AttrsExt {
    /// Get an attribute value by name
    fn get_attr(&self, name: &str) -> Option<&str>;

    /// Check if an attribute exists
    fn has_attr(&self, name: &str) -> bool;

    /// Set an attribute value (insert or update)
    fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>);

    /// Remove an attribute by name, returning the old value if present
    fn remove_attr(&mut self, name: &str) -> Option<String>;

    /// Get a `data-*` attribute by its suffix (`data("s")` reads `data-s`)
    fn data(&self, key: &str) -> Option<&str>;

    /// Check if the whitespace-separated `class` list contains `class`
    fn has_class(&self, class: &str) -> bool;

    /// Read a boolean flag attribute (`true`/`1`/`on`/empty mean set)
    fn flag(&self, name: &str) -> bool;
}

impl AttrsExt for Attrs {
    fn get_attr(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn has_attr(&self, name: &str) -> bool {
        self.iter().any(|(k, _)| k == name)
    }

    fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(attr) = self.iter_mut().find(|(k, _)| k == &name) {
            attr.1 = value;
        } else {
            self.push((name, value));
        }
    }

    fn remove_attr(&mut self, name: &str) -> Option<String> {
        self.iter()
            .position(|(k, _)| k == name)
            .map(|pos| self.remove(pos).1)
    }

    fn data(&self, key: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.strip_prefix("data-") == Some(key))
            .map(|(_, v)| v.as_str())
    }

    fn has_class(&self, class: &str) -> bool {
        self.get_attr("class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }

    fn flag(&self, name: &str) -> bool {
        match self.get_attr(name) {
            Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "" | "true" | "1" | "on" | "yes"),
            None => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attrs_operations() {
        let mut attrs: Attrs = Vec::new();

        attrs.set_attr("id", "main");
        attrs.set_attr("class", "container");
        assert_eq!(attrs.len(), 2);

        assert_eq!(attrs.get_attr("id"), Some("main"));
        assert_eq!(attrs.get_attr("href"), None);
        assert!(attrs.has_attr("id"));

        attrs.set_attr("class", "wrapper");
        assert_eq!(attrs.get_attr("class"), Some("wrapper"));
        assert_eq!(attrs.len(), 2);

        let removed = attrs.remove_attr("id");
        assert_eq!(removed.as_deref(), Some("main"));
        assert!(!attrs.has_attr("id"));
    }

    #[test]
    fn test_data_and_class_helpers() {
        let attrs: Attrs = vec![
            ("class".into(), "tag  is-active".into()),
            ("data-s".into(), "PER_1".into()),
            ("data-indep".into(), "true".into()),
            ("data-off".into(), "false".into()),
        ];

        assert_eq!(attrs.data("s"), Some("PER_1"));
        assert_eq!(attrs.data("i"), None);
        assert!(attrs.has_class("tag"));
        assert!(attrs.has_class("is-active"));
        assert!(!attrs.has_class("ta"));
        assert!(attrs.flag("data-indep"));
        assert!(!attrs.flag("data-off"));
        assert!(!attrs.flag("data-missing"));
    }
}
