//! Serving root: maps browser paths onto files without leaving the root.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

use super::{PathError, WatchTarget};

/// Suffix appended to a document path to reach its push endpoint.
pub const SOCKET_SUFFIX: &str = "/ws";

/// Directory being served, plus the document named on the command line.
#[derive(Debug, Clone)]
pub struct ServeRoot {
    dir: PathBuf,
    document: Option<String>,
}

impl ServeRoot {
    /// Build a root from the CLI argument.
    ///
    /// - markdown file: serve its directory, `/` points at the file
    /// - directory: serve it, `/` lists its documents
    pub fn new(arg: &Path) -> Result<Self, PathError> {
        let canonical = arg
            .canonicalize()
            .map_err(|_| PathError::NotFound(arg.to_path_buf()))?;

        if canonical.is_dir() {
            return Ok(Self {
                dir: canonical,
                document: None,
            });
        }

        if !is_markdown(&canonical) {
            return Err(PathError::NotMarkdown(canonical));
        }

        let document = canonical
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .ok_or_else(|| PathError::InvalidEncoding(arg.display().to_string()))?;
        let dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| PathError::NotAFile(canonical.clone()))?;

        Ok(Self {
            dir,
            document: Some(document),
        })
    }

    /// Canonical directory being served.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Document named on the command line (single-file mode).
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    /// Resolve a document URL (`/notes/today.md`) into a watch target.
    pub fn resolve_document(&self, url: &str) -> Result<WatchTarget, PathError> {
        let relative = clean_url_path(url)?;
        if !is_markdown(&relative) {
            return Err(PathError::NotMarkdown(relative));
        }
        let path = self.confine(&relative)?;
        WatchTarget::new(&path)
    }

    /// Resolve a push endpoint URL (`/notes/today.md/ws`) into a watch target.
    pub fn resolve_socket(&self, url: &str) -> Result<WatchTarget, PathError> {
        let path = strip_query(url);
        let document = path
            .strip_suffix(SOCKET_SUFFIX)
            .ok_or_else(|| PathError::NotMarkdown(PathBuf::from(path)))?;
        self.resolve_document(document)
    }

    /// Resolve an auxiliary asset URL (images, stylesheets) to a file.
    pub fn resolve_asset(&self, url: &str) -> Result<PathBuf, PathError> {
        let relative = clean_url_path(url)?;
        let path = self.confine(&relative)?;
        if !path.is_file() {
            return Err(PathError::NotAFile(path));
        }
        Ok(path)
    }

    /// Markdown documents directly inside the root, sorted by name.
    pub fn documents(&self) -> std::io::Result<Vec<String>> {
        let mut names: Vec<String> = std::fs::read_dir(&self.dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_markdown(path))
            .filter_map(|path| path.file_name()?.to_str().map(str::to_owned))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Path of a target relative to the root, for display.
    pub fn relative(&self, target: &WatchTarget) -> String {
        target
            .path()
            .strip_prefix(&self.dir)
            .unwrap_or(target.path())
            .display()
            .to_string()
    }

    /// Join a cleaned relative path and verify the result stays inside the root.
    ///
    /// Canonicalizing catches escapes through symlinks.
    fn confine(&self, relative: &Path) -> Result<PathBuf, PathError> {
        let joined = self.dir.join(relative);
        let canonical = joined
            .canonicalize()
            .map_err(|_| PathError::NotFound(joined.clone()))?;

        if !canonical.starts_with(&self.dir) {
            return Err(PathError::OutsideRoot(canonical));
        }
        Ok(canonical)
    }
}

/// Check whether a path names a markdown document.
pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// Decode a browser path into a relative filesystem path.
///
/// Rejects `..` segments, backslashes, drive prefixes and NUL bytes
/// after percent-decoding, so encoded escapes are caught too.
fn clean_url_path(url: &str) -> Result<PathBuf, PathError> {
    let path = strip_query(url);
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_err(|_| PathError::InvalidEncoding(path.to_owned()))?;

    let mut relative = PathBuf::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(PathError::Traversal(decoded.to_string())),
            s if s.contains(['\\', ':', '\0']) => {
                return Err(PathError::Traversal(decoded.to_string()));
            }
            s => relative.push(s),
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(PathError::NotAFile(relative));
    }
    Ok(relative)
}
