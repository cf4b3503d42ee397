//! Embedded static resources.
//!
//! # Module Structure
//!
//! - `template` - `__NAME__` insertion-point templates
//! - `serve` - Preview server pages (preview.html, index.html)
//!
//! # Usage
//!
//! ```ignore
//! use embed::serve::{PREVIEW_HTML, PreviewVars};
//!
//! let html = PREVIEW_HTML.render(&PreviewVars {
//!     title: "README.md".to_string(),
//!     ws_port: 35729,
//! });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod serve {
    use super::{Template, TemplateVars};
    use crate::utils::html::escape;
    use crate::utils::url::document_href;

    /// Variables for preview.html template.
    pub struct PreviewVars {
        pub title: String,
        pub ws_port: u16,
    }

    impl TemplateVars for PreviewVars {
        fn values(&self) -> Vec<(&'static str, String)> {
            vec![
                ("TITLE", escape(&self.title).into_owned()),
                ("WS_PORT", self.ws_port.to_string()),
            ]
        }
    }

    /// Page that connects to `<page>/ws` and shows every pushed render.
    pub const PREVIEW_HTML: Template<PreviewVars> =
        Template::new(include_str!("serve/preview.html"));

    /// Variables for index.html template.
    pub struct IndexVars {
        pub title: String,
        /// Document names, linked as `/<name>`.
        pub documents: Vec<String>,
    }

    impl TemplateVars for IndexVars {
        fn values(&self) -> Vec<(&'static str, String)> {
            let entries: String = self
                .documents
                .iter()
                .map(|name| {
                    format!(
                        "    <li><a href=\"{}\">{}</a></li>\n",
                        document_href(name),
                        escape(name)
                    )
                })
                .collect();

            vec![
                ("TITLE", escape(&self.title).into_owned()),
                ("ENTRIES", entries.trim_end().to_string()),
            ]
        }
    }

    /// Directory listing of markdown documents.
    pub const INDEX_HTML: Template<IndexVars> =
        Template::new(include_str!("serve/index.html"));

}
