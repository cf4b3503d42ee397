//! Embedded page templates.
//!
//! A template is a static HTML string with `__NAME__` insertion points
//! (upper-case name between double underscores). A [`TemplateVars`] set names
//! the value for each point; [`Template::render`] substitutes every
//! occurrence. Values are inserted verbatim, so vars escape their own text.

use std::marker::PhantomData;

/// Values for a template's insertion points
pub trait TemplateVars {
    /// `(NAME, value)` pairs; `NAME` is written without the underscores.
    fn values(&self) -> Vec<(&'static str, String)>;
}

/// Static page with typed insertion points
#[derive(Debug, Clone, Copy)]
pub struct Template<V> {
    content: &'static str,
    _marker: PhantomData<V>,
}

impl<V> Template<V> {
    pub const fn new(content: &'static str) -> Self {
        Self {
            content,
            _marker: PhantomData,
        }
    }
}

impl<V: TemplateVars> Template<V> {
    pub fn render(&self, vars: &V) -> String {
        vars.values()
            .into_iter()
            .fold(self.content.to_string(), |html, (name, value)| {
                html.replace(&placeholder(name), &value)
            })
    }
}

fn placeholder(name: &str) -> String {
    format!("__{name}__")
}
