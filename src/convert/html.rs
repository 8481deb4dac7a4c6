//! Lenient HTML fragment parsing
//!
//! Server content is HTML, not XML: end tags may be missing or mismatched,
//! void elements are never closed and entities go beyond the five XML ones.
//! The tokenizer runs with end-name checks disabled and this module does the
//! tree building:
//!
//! - void elements never take children
//! - an end tag closes the nearest open element with that name and
//!   everything opened after it; an end tag with no open match is ignored
//! - elements still open at the end of input are closed
//! - text is unescaped with the full HTML entity table
//! - whitespace-only text between blocks is dropped, so indentation in the
//!   source never becomes document offsets

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::attr::Attrs;
use crate::error::ConvertError;
use crate::node::{Children, Document, Element, Node};

/// Elements that never have children
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Parse an HTML fragment into a document under a fresh root
pub fn from_html(html: &str) -> Result<Document, ConvertError> {
    let mut root = Element::root();
    root.children = parse_fragment(html)?;
    drop_layout_whitespace(&mut root);
    let doc = Document::new(root);
    tracing::debug!(len = doc.len(), "parsed HTML fragment");
    Ok(doc)
}

/// Parse an HTML fragment into top-level nodes
pub fn parse_fragment(html: &str) -> Result<Children, ConvertError> {
    let mut reader = Reader::from_str(html);
    reader.trim_text(false);
    reader.check_end_names(false);

    let mut builder = TreeBuilder::default();
    loop {
        let event = reader.read_event().map_err(|e| ConvertError::Malformed {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;
        match event {
            Event::Start(start) => {
                let elem = element_from(&start)?;
                if is_void(&elem.tag) {
                    builder.append(Node::element(elem));
                } else {
                    builder.open(elem);
                }
            }
            Event::Empty(start) => {
                let elem = element_from(&start)?;
                builder.append(Node::element(elem));
            }
            Event::End(end) => {
                let name = std::str::from_utf8(end.name().as_ref())
                    .map_err(|_| ConvertError::Encoding)?
                    .to_ascii_lowercase();
                builder.close(&name);
            }
            Event::Text(text) => {
                let raw = std::str::from_utf8(&text).map_err(|_| ConvertError::Encoding)?;
                builder.text(&htmlize::unescape(raw));
            }
            Event::CData(data) => {
                let raw = std::str::from_utf8(&data).map_err(|_| ConvertError::Encoding)?;
                builder.text(raw);
            }
            Event::Eof => break,
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }
    Ok(builder.finish())
}

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Build an element from a start tag, classifying it by tag and attributes
fn element_from(start: &BytesStart<'_>) -> Result<Element, ConvertError> {
    let tag = std::str::from_utf8(start.name().as_ref())
        .map_err(|_| ConvertError::Encoding)?
        .to_ascii_lowercase();

    let mut attrs = Attrs::new();
    for attr in start.html_attributes().with_checks(false) {
        let Ok(attr) = attr else {
            tracing::trace!(%tag, "skipping malformed attribute");
            continue;
        };
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(|_| ConvertError::Encoding)?;
        let value = std::str::from_utf8(&attr.value).map_err(|_| ConvertError::Encoding)?;
        attrs.push((key.to_ascii_lowercase(), htmlize::unescape_attribute(value).into_owned()));
    }
    Ok(Element::auto(tag, attrs))
}

// =============================================================================
// Tree building
// =============================================================================

/// Stack of open elements; closed elements are appended to their parent
#[derive(Default)]
struct TreeBuilder {
    top: Children,
    open: Vec<Element>,
}

impl TreeBuilder {
    /// Children of the innermost open element
    fn current(&mut self) -> &mut Children {
        match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.top,
        }
    }

    fn append(&mut self, node: Node) {
        self.current().push(node);
    }

    /// Append text, joining it with a preceding text node
    fn text(&mut self, content: &str) {
        if content.is_empty() {
            return;
        }
        let children = self.current();
        if let Some(Node::Text(last)) = children.last_mut() {
            last.content.push_str(content);
        } else {
            children.push(Node::text(content));
        }
    }

    fn open(&mut self, elem: Element) {
        self.open.push(elem);
    }

    fn close(&mut self, name: &str) {
        let Some(pos) = self.open.iter().rposition(|e| e.tag == name) else {
            tracing::trace!(tag = name, "ignoring unmatched end tag");
            return;
        };
        while self.open.len() > pos {
            self.pop();
        }
    }

    fn pop(&mut self) {
        if let Some(elem) = self.open.pop() {
            self.append(Node::element(elem));
        }
    }

    fn finish(mut self) -> Children {
        while !self.open.is_empty() {
            self.pop();
        }
        self.top
    }
}

/// Drop whitespace-only text from elements that hold blocks
fn drop_layout_whitespace(elem: &mut Element) {
    let holds_blocks = elem.children.iter().any(|child| {
        child
            .kind()
            .is_some_and(|k| k.is_structural() || k.is_pinned())
    });
    if holds_blocks || elem.kind.is_root() {
        elem.children.retain(|child| !matches!(child, Node::Text(t) if t.is_whitespace()));
    }
    for child in elem.children.iter_mut() {
        if let Node::Element(e) = child {
            drop_layout_whitespace(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::LabelId;
    use crate::node::ElementKind;

    #[test]
    fn test_paragraphs_and_whitespace() {
        let doc = from_html("<p>Alice met Bob.</p>\n  <p>They went to Paris.</p>\n").unwrap();
        assert_eq!(doc.root.child_count(), 2);
        assert_eq!(doc.plain_text(), "Alice met Bob.\nThey went to Paris.\n");
    }

    #[test]
    fn test_indented_lists_and_quotes() {
        let html = "<ul>\n  <li>ab</li>\n  <li>cd</li>\n</ul>\n<blockquote>\n  <p>ef</p>\n</blockquote>";
        let doc = from_html(html).unwrap();
        assert_eq!(doc.plain_text(), "\nab\ncd\n\nef\n");
        assert!(doc.root.first_child().is_some_and(|e| e.kind.is_list()));
    }

    #[test]
    fn test_void_and_unclosed_elements() {
        let doc = from_html("<p>one<br>two<p>three<img src=x.png></div>").unwrap();
        // The second <p> nests inside the first: no implied end tags
        let first = doc.root.first_child().unwrap();
        assert!(first.children_elements().any(|e| e.kind.is_line_break()));
        assert_eq!(doc.text_content(), "onetwothree");
    }

    #[test]
    fn test_entities_unescaped() {
        let doc = from_html("<p>caf&eacute; &amp; cr&egrave;me&nbsp;br&ucirc;l&eacute;e</p>").unwrap();
        assert_eq!(doc.text_content(), "café & crème\u{a0}brûlée");
    }

    #[test]
    fn test_labels_and_wrappers_classified() {
        let html = r#"<div class="scrollable">
            <p><span class="tag" data-i="3" data-s="PER">Bob</span> smiled</p>
        </div>
        <div class="pinned"><p>Instructions</p></div>"#;
        let doc = from_html(html).unwrap();
        assert!(doc.root.first_child().is_some_and(|e| e.kind.is_scrollable()));
        let label = doc.find_element(|e| e.kind.is_label()).unwrap();
        assert_eq!(label.label_id(), Some(LabelId::from_raw(3)));
        assert!(doc.iter_elements().any(|e| matches!(e.kind, ElementKind::Pinned)));
        assert_eq!(doc.plain_text(), "Bob smiled\n");
    }

    #[test]
    fn test_boolean_attributes() {
        let nodes = parse_fragment(r#"<input type="radio" name="ok" value="yes" checked>"#).unwrap();
        let Node::Element(input) = &nodes[0] else {
            panic!("expected an element");
        };
        assert!(input.has_attr("checked"));
        assert_eq!(input.get_attr("value"), Some("yes"));
    }
}
