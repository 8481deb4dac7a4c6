//! Source format converters
//!
//! The server hands out document content (new texts, restored batches,
//! edit/review templates) as HTML fragments. This module turns them into a
//! [`Document`](crate::node::Document) wrapped in a root element.
//!
//! | Format | Module | Function |
//! |--------|--------|----------|
//! | HTML | [`html`] | [`from_html()`] |

pub mod html;

pub use self::html::{from_html, parse_fragment, VOID_ELEMENTS};
