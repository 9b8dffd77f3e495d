//! On-disk layout of a ctx project.
//!
//! ```text
//! <project>/
//!   .context/
//!     manifest.toml
//!     lock.toml
//!     packages/
//!     locks/
//! ```

use std::path::{Path, PathBuf};

/// Name of the per-project state directory.
pub const CONTEXT_DIR: &str = ".context";

/// Paths of one project rooted at `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProjectLayout { root: root.into() }
    }

    /// Walk upward from `start` to the first directory holding `.context/manifest.toml`.
    pub fn discover(start: &Path) -> Option<Self> {
        start
            .ancestors()
            .map(ProjectLayout::new)
            .find(|layout| layout.manifest_path().is_file())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn context_dir(&self) -> PathBuf {
        self.root.join(CONTEXT_DIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.context_dir().join("manifest.toml")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.context_dir().join("lock.toml")
    }

    /// Checkouts of every resolved source.
    pub fn packages_dir(&self) -> PathBuf {
        self.context_dir().join("packages")
    }

    /// Scope lock records.
    pub fn locks_dir(&self) -> PathBuf {
        self.context_dir().join("locks")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_context_dir() {
        let layout = ProjectLayout::new("/work/proj");
        assert_eq!(layout.lock_path(), Path::new("/work/proj/.context/lock.toml"));
        assert_eq!(layout.packages_dir(), Path::new("/work/proj/.context/packages"));
        assert_eq!(layout.locks_dir(), Path::new("/work/proj/.context/locks"));
    }

    #[test]
    fn discover_walks_upward() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        std::fs::create_dir_all(layout.context_dir()).unwrap();
        std::fs::write(layout.manifest_path(), "sources = []\n").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(ProjectLayout::discover(&nested), Some(layout));
    }

    #[test]
    fn discover_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        // Ancestors of a fresh temp dir are not expected to hold a project.
        let found = ProjectLayout::discover(dir.path());
        assert!(found.map_or(true, |l| l.root() != dir.path()));
    }
}
