//! Small helpers shared by the HTTP surface and templates.

pub mod html;
pub mod mime;
pub mod url;
