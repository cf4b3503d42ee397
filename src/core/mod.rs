//! Core types shared by the HTTP surface and the push pipeline.

mod root;
mod state;
mod target;

use std::path::PathBuf;

use thiserror::Error;

pub use root::{ServeRoot, is_markdown};
pub use state::{is_shutdown, register_server, setup_shutdown_handler};
pub use target::WatchTarget;

/// Why a requested path cannot be bound or served.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("path traversal rejected: `{0}`")]
    Traversal(String),

    #[error("`{0}` escapes the serving root")]
    OutsideRoot(PathBuf),

    #[error("`{0}` is not a markdown document")]
    NotMarkdown(PathBuf),

    #[error("`{0}` does not exist")]
    NotFound(PathBuf),

    #[error("`{0}` is not a file")]
    NotAFile(PathBuf),

    #[error("invalid path encoding: `{0}`")]
    InvalidEncoding(String),
}

impl PathError {
    /// HTTP status used when rejecting a request for this path.
    pub fn status(&self) -> u16 {
        match self {
            Self::Traversal(_) | Self::OutsideRoot(_) => 403,
            Self::InvalidEncoding(_) => 400,
            Self::NotMarkdown(_) | Self::NotFound(_) | Self::NotAFile(_) => 404,
        }
    }
}
