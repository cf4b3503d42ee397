//! Automatic heading ids (`## Install` -> `id="install"`).

use std::collections::HashSet;

use pulldown_cmark::{CowStr, Event, Tag, TagEnd};

/// Give every heading without an explicit id a unique slug id.
///
/// Explicit ids (`# Title {#custom}`) are reserved first so generated
/// ids never collide with them.
pub(super) fn assign_ids(events: &mut [Event<'_>]) {
    let mut ids = UniqueIds::default();

    for event in events.iter() {
        if let Event::Start(Tag::Heading { id: Some(id), .. }) = event {
            ids.reserve(id);
        }
    }

    for i in 0..events.len() {
        if !matches!(events[i], Event::Start(Tag::Heading { id: None, .. })) {
            continue;
        }
        let slug = ids.unique(slugify(&heading_text(&events[i + 1..])));
        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(CowStr::from(slug));
        }
    }
}

/// Plain text of a heading, up to its end tag.
fn heading_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

/// Lowercase, keep letters, digits, `-` and `_`, turn whitespace into `-`.
pub(super) fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() {
            slug.push('-');
        }
    }
    if slug.is_empty() {
        slug.push_str("heading");
    }
    slug
}

#[derive(Default)]
struct UniqueIds {
    used: HashSet<String>,
}

impl UniqueIds {
    fn reserve(&mut self, id: &str) {
        self.used.insert(id.to_owned());
    }

    /// `base`, or `base-1`, `base-2`, ... for repeats.
    fn unique(&mut self, base: String) -> String {
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}-{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{MarkdownOptions, render_str};
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello"), "hello");
        assert_eq!(slugify("Hello World!"), "hello-world");
        assert_eq!(slugify("  snake_case and-dash "), "snake_case-and-dash");
        assert_eq!(slugify("Über Straße"), "über-straße");
        assert_eq!(slugify("!!!"), "heading");
    }

    #[test]
    fn test_duplicate_headings_get_suffix() {
        let html = render_str("# Intro\n\n## Intro\n\n### Intro", &MarkdownOptions::all());
        assert!(html.contains("<h1 id=\"intro\">"));
        assert!(html.contains("<h2 id=\"intro-1\">"));
        assert!(html.contains("<h3 id=\"intro-2\">"));
    }

    #[test]
    fn test_explicit_id_kept_and_reserved() {
        let html = render_str("# Custom {#setup}\n\n## Setup", &MarkdownOptions::all());
        assert!(html.contains("<h1 id=\"setup\">Custom</h1>"));
        assert!(html.contains("<h2 id=\"setup-1\">Setup</h2>"));
    }

    #[test]
    fn test_inline_code_in_heading() {
        let html = render_str("## The `render` fn", &MarkdownOptions::all());
        assert!(html.contains("id=\"the-render-fn\""));
    }
}
