//! Temporary directory trees and test logging.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// A temporary directory populated for a test; removed on drop.
#[derive(Debug)]
pub struct FileTree {
    dir: TempDir,
}

impl FileTree {
    /// An empty tree.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Tenants `client-a` and `client-b` plus a `shared` area:
    ///
    /// ```text
    /// client-a/readme.txt
    /// client-a/docs/report.txt
    /// client-b/secret.txt
    /// shared/notice.txt
    /// ```
    #[must_use]
    pub fn tenants() -> Self {
        Self::new()
            .file("client-a/readme.txt", "hello a")
            .file("client-a/docs/report.txt", "report")
            .file("client-b/secret.txt", "top secret")
            .file("shared/notice.txt", "notice")
    }

    /// Absolute path of the tree's root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of `rel` inside the tree.
    #[must_use]
    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Add a directory (and its parents).
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    #[must_use]
    pub fn dir(self, rel: &str) -> Self {
        std::fs::create_dir_all(self.path(rel)).expect("Failed to create directory");
        self
    }

    /// Add a file with `content`, creating parent directories.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[must_use]
    pub fn file(self, rel: &str, content: &str) -> Self {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        self
    }

    /// Add a symlink at `rel` pointing to `target`.
    ///
    /// # Panics
    ///
    /// Panics if the link cannot be created.
    #[cfg(unix)]
    #[must_use]
    pub fn symlink(self, rel: &str, target: &Path) -> Self {
        std::os::unix::fs::symlink(target, self.path(rel)).expect("Failed to create symlink");
        self
    }
}

impl Default for FileTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Set up test logging with the given filter. Safe to call repeatedly.
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}
