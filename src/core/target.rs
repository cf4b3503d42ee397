//! Watch target: the single document a push session observes.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use super::PathError;

/// Absolute, resolved path of a watched document.
///
/// Invariants:
/// - Canonical (symlinks and `.`/`..` resolved at creation)
/// - Points at a regular file at creation time
/// - Never mutated afterwards; the file itself may come and go
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchTarget {
    path: PathBuf,
    dir: PathBuf,
    name: OsString,
}

impl WatchTarget {
    /// Resolve `path` into a watch target.
    pub fn new(path: &Path) -> Result<Self, PathError> {
        let path = path
            .canonicalize()
            .map_err(|_| PathError::NotFound(path.to_path_buf()))?;

        if !path.is_file() {
            return Err(PathError::NotAFile(path));
        }

        let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
            return Err(PathError::NotAFile(path));
        };
        let (dir, name) = (dir.to_path_buf(), name.to_os_string());

        Ok(Self { path, dir, name })
    }

    /// Full path of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the document (the subscription point).
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name of the document.
    pub fn file_name(&self) -> &OsStr {
        &self.name
    }

    /// Whether an event path refers to this document.
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name() == Some(self.name.as_os_str())
    }
}

impl std::fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_target_is_canonical() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("doc.md"), "# doc").unwrap();

        let target = WatchTarget::new(&dir.path().join("./doc.md")).unwrap();
        assert!(target.path().is_absolute());
        assert_eq!(target.file_name(), "doc.md");
        assert_eq!(target.dir(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_target_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = WatchTarget::new(&dir.path().join("missing.md")).unwrap_err();
        assert!(matches!(err, PathError::NotFound(_)));
    }

    #[test]
    fn test_target_rejects_directory() {
        let dir = TempDir::new().unwrap();
        let err = WatchTarget::new(dir.path()).unwrap_err();
        assert!(matches!(err, PathError::NotAFile(_)));
    }

    #[test]
    fn test_matches_by_file_name() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("doc.md"), "").unwrap();
        let target = WatchTarget::new(&dir.path().join("doc.md")).unwrap();

        assert!(target.matches(&target.dir().join("doc.md")));
        assert!(!target.matches(&target.dir().join("other.md")));
        assert!(!target.matches(&target.dir().join(".doc.md.swp")));
    }
}
