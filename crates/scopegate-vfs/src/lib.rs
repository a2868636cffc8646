//! Scopegate Virtual File System (VFS).
//!
//! Provides the filesystem surface handed to a file-transfer session:
//! a host-backed implementation jailed to a root directory, and a scoped
//! decorator that hides everything outside a session's granted paths.
//!
//! Callers resolve a client path with [`Vfs::resolve_path`] first and pass the
//! resolved path to the remaining operations. A decorator may redirect the
//! resolution, which is how [`ScopedVfs`] makes restricted paths disappear.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/// Virtual filesystem error types.
pub mod error;
/// File handles and open flags.
pub mod handle;
/// Host-backed virtual filesystem implementation.
pub mod host;
/// Path resolution and jailing utilities.
pub mod path;
/// Visibility-scoped virtual filesystem decorator.
pub mod scoped;

pub use error::{VfsError, VfsResult};
pub use handle::{FileHandle, OpenFlags};
pub use host::HostVfs;
pub use scoped::{BLACKHOLE_PREFIX, ScopedVfs};

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// File metadata returned by stat.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct VfsMetadata {
    /// True if the entry is a directory.
    pub is_dir: bool,
    /// True if the entry is a file.
    pub is_file: bool,
    /// True if the entry is a symbolic link (only reported by `lstat`).
    pub is_symlink: bool,
    /// Size of the file in bytes.
    pub size: u64,
    /// Modification time in seconds since the UNIX epoch.
    pub mtime: u64,
    /// Unix permission bits (0 on platforms without them).
    pub mode: u32,
}

impl From<&std::fs::Metadata> for VfsMetadata {
    fn from(metadata: &std::fs::Metadata) -> Self {
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0u64, |d| d.as_secs());

        #[cfg(unix)]
        let mode = {
            use std::os::unix::fs::PermissionsExt;
            metadata.permissions().mode()
        };
        #[cfg(not(unix))]
        let mode = 0;

        Self {
            is_dir: metadata.is_dir(),
            is_file: metadata.is_file(),
            is_symlink: metadata.file_type().is_symlink(),
            size: metadata.len(),
            mtime,
            mode,
        }
    }
}

/// Directory entry returned by `read_dir`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VfsDirEntry {
    /// Name of the entry relative to the listed directory.
    pub name: String,
    /// Metadata of the entry, when the backend could read it.
    pub metadata: Option<VfsMetadata>,
}

impl VfsDirEntry {
    /// Returns true for the `.` and `..` pseudo-entries.
    #[must_use]
    pub fn is_dot_entry(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// The result of listing a directory.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DirListing {
    /// The resolved path of the directory that was listed.
    pub base_path: PathBuf,
    /// Entries, `.` and `..` first, the rest sorted by name.
    pub entries: Vec<VfsDirEntry>,
}

impl DirListing {
    /// Entry names in listing order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }
}

/// The filesystem surface a file-transfer session operates on.
///
/// Every path-taking operation expects a path previously produced by
/// [`Vfs::resolve_path`] on the same instance.
#[async_trait]
pub trait Vfs: Send + Sync {
    /// The absolute directory this filesystem presents as `/`.
    fn root(&self) -> &Path;

    /// Translate a client path into the path the operations act upon.
    ///
    /// # Errors
    ///
    /// Returns an error if the candidate cannot be interpreted as a path.
    fn resolve_path(&self, candidate: &str) -> VfsResult<PathBuf>;

    /// Get metadata for a path, following symlinks.
    async fn stat(&self, path: &Path) -> VfsResult<VfsMetadata>;

    /// Get metadata for a path without following a final symlink.
    async fn lstat(&self, path: &Path) -> VfsResult<VfsMetadata>;

    /// List the contents of a directory.
    async fn read_dir(&self, path: &Path) -> VfsResult<DirListing>;

    /// Create a directory.
    async fn mkdir(&self, path: &Path) -> VfsResult<()>;

    /// Remove an empty directory.
    async fn rmdir(&self, path: &Path) -> VfsResult<()>;

    /// Remove a file or symlink.
    async fn remove(&self, path: &Path) -> VfsResult<()>;

    /// Rename a file or directory.
    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()>;

    /// Read the target of a symbolic link.
    async fn read_link(&self, path: &Path) -> VfsResult<PathBuf>;

    /// Canonicalize a path, resolving every symlink along it.
    async fn real_path(&self, path: &Path) -> VfsResult<PathBuf>;

    /// Open a file. Returns a handle.
    async fn open(&self, path: &Path, flags: OpenFlags) -> VfsResult<FileHandle>;

    /// Read up to `len` bytes at `offset` from an open file.
    async fn read(&self, handle: &FileHandle, offset: u64, len: usize) -> VfsResult<Vec<u8>>;

    /// Write `content` at `offset` into an open file.
    async fn write(&self, handle: &FileHandle, offset: u64, content: &[u8]) -> VfsResult<()>;

    /// Get metadata of an open file.
    async fn fstat(&self, handle: &FileHandle) -> VfsResult<VfsMetadata>;

    /// Truncate or extend an open file.
    async fn set_len(&self, handle: &FileHandle, len: u64) -> VfsResult<()>;

    /// Close a file handle.
    async fn close(&self, handle: &FileHandle) -> VfsResult<()>;
}
