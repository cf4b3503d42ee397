//! URL path encoding for links to documents.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters escaped in a path segment of a generated link.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

/// Absolute URL path for a document name relative to the root (`/a%20b.md`).
pub fn document_href(name: &str) -> String {
    format!("/{}", utf8_percent_encode(name, SEGMENT))
}
