//! Markdown to HTML rendering using pulldown-cmark.
//!
//! Rendering is a pure function of the input bytes: no caching, no state.
//! Every push re-renders the file from scratch.

mod heading;

use pulldown_cmark::{Event, Options, Parser, html};
use thiserror::Error;

/// Rendering failures. Recoverable: the current push cycle is skipped.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("document is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Options for markdown conversion
#[derive(Debug, Clone, Default)]
pub struct MarkdownOptions {
    /// Enable tables extension
    pub tables: bool,
    /// Enable footnotes extension
    pub footnotes: bool,
    /// Enable strikethrough extension
    pub strikethrough: bool,
    /// Enable task lists extension
    pub task_lists: bool,
    /// Enable heading attributes extension (e.g., `# Heading {#custom-id}`)
    pub heading_attributes: bool,
    /// Generate `id` attributes for headings without an explicit one
    pub auto_heading_ids: bool,
}

impl MarkdownOptions {
    /// Create options with all extensions enabled (GitHub flavored)
    pub fn all() -> Self {
        Self {
            tables: true,
            footnotes: true,
            strikethrough: true,
            task_lists: true,
            heading_attributes: true,
            auto_heading_ids: true,
        }
    }

    /// Convert to pulldown-cmark Options
    fn to_pulldown_options(&self) -> Options {
        let mut opts = Options::empty();
        if self.tables {
            opts.insert(Options::ENABLE_TABLES);
        }
        if self.footnotes {
            opts.insert(Options::ENABLE_FOOTNOTES);
        }
        if self.strikethrough {
            opts.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.task_lists {
            opts.insert(Options::ENABLE_TASKLISTS);
        }
        if self.heading_attributes {
            opts.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        }
        opts
    }
}

/// Render document bytes to an HTML fragment.
pub fn render(source: &[u8]) -> Result<String, RenderError> {
    let markdown = std::str::from_utf8(source)?;
    Ok(render_str(markdown, &MarkdownOptions::all()))
}

/// Render a markdown string to an HTML fragment with explicit options.
pub fn render_str(markdown: &str, options: &MarkdownOptions) -> String {
    let mut events: Vec<Event<'_>> =
        Parser::new_ext(markdown, options.to_pulldown_options()).collect();

    if options.auto_heading_ids {
        heading::assign_ids(&mut events);
    }

    let mut out = String::with_capacity(markdown.len() + markdown.len() / 2);
    html::push_html(&mut out, events.into_iter());
    out
}
