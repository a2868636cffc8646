use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::{DirListing, FileHandle, OpenFlags, Vfs, VfsError, VfsMetadata, VfsResult};

/// Namespace that restricted paths are redirected under. Nothing below it is
/// ever served, so redirected paths fail as "not found".
pub const BLACKHOLE_PREFIX: &str = "/blackhole/jail";

/// A Virtual Filesystem that only lets a session observe its granted paths.
///
/// Wraps another [`Vfs`] and intercepts two things: path resolution, which
/// sends restricted paths into [`BLACKHOLE_PREFIX`], and directory listing,
/// which drops restricted entries. Everything else is forwarded.
///
/// The root itself is always visible so a client can browse down into its
/// grants. A grant makes the granted directory and all of its descendants
/// visible.
pub struct ScopedVfs {
    /// The underlying filesystem.
    inner: Box<dyn Vfs>,
    /// Absolute root of the underlying filesystem.
    root_path: PathBuf,
    /// `root_path` joined with each granted relative path.
    allowed_absolute_paths: Vec<PathBuf>,
}

impl ScopedVfs {
    /// Creates a new `ScopedVfs`.
    ///
    /// # Arguments
    /// * `inner` - The filesystem to wrap; its root is the scope's root.
    /// * `authorized_paths` - Paths relative to the root the session may see.
    #[must_use]
    pub fn new<I, S>(inner: Box<dyn Vfs>, authorized_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let root_path = inner.root().to_path_buf();
        let allowed_absolute_paths = authorized_paths
            .into_iter()
            .map(|p| root_path.join(p.as_ref()))
            .collect();

        Self {
            inner,
            root_path,
            allowed_absolute_paths,
        }
    }

    /// The absolute paths this view exposes (besides the root).
    #[must_use]
    pub fn allowed_paths(&self) -> &[PathBuf] {
        &self.allowed_absolute_paths
    }

    /// Whether an absolute, resolved path is visible through this view.
    #[must_use]
    pub fn is_allowed(&self, absolute_path: &Path) -> bool {
        // Path comparison is per component, so a trailing separator is
        // already ignored and `client-ab` is not under `client-a`.
        if absolute_path == self.root_path {
            return true;
        }

        self.allowed_absolute_paths
            .iter()
            .any(|allowed| absolute_path.starts_with(allowed))
    }

    fn blackhole(resolved: &Path) -> PathBuf {
        let mut hidden = PathBuf::from(BLACKHOLE_PREFIX);
        for component in resolved.components() {
            if let Component::Normal(name) = component {
                hidden.push(name);
            }
        }
        hidden
    }

    /// Where `path` really lives, expressed under `root_path`.
    ///
    /// Canonicalizes the deepest existing ancestor (or `path` itself when
    /// `follow_final` is set). Returns `None` when nothing on the path exists
    /// inside the root, which leaves the decision to the lexical check.
    async fn canonical_location(&self, path: &Path, follow_final: bool) -> Option<PathBuf> {
        let canonical_root = tokio::fs::canonicalize(&self.root_path).await.ok()?;

        let mut current = path.to_path_buf();
        let mut rest = Vec::new();

        if !follow_final && path != self.root_path {
            if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
                rest.push(name.to_owned());
                current = parent.to_path_buf();
            }
        }

        loop {
            if !current.starts_with(&self.root_path) {
                return None;
            }

            if tokio::fs::symlink_metadata(&current).await.is_ok() {
                let canonical = tokio::fs::canonicalize(&current).await.ok()?;
                let relative = canonical.strip_prefix(&canonical_root).ok()?;
                let mut location = self.root_path.join(relative);
                for name in rest.into_iter().rev() {
                    location.push(name);
                }
                return Some(location);
            }

            let name = current.file_name()?.to_owned();
            rest.push(name);
            current = current.parent()?.to_path_buf();
        }
    }

    /// Fail with "not found" unless `path` is visible both lexically and
    /// after following symlinks.
    async fn reveal(&self, path: &Path, follow_final: bool) -> VfsResult<()> {
        if !self.is_allowed(path) {
            debug!(path = %path.display(), "hiding path outside session grant");
            return Err(VfsError::NotFound(path.display().to_string()));
        }

        if let Some(location) = self.canonical_location(path, follow_final).await {
            if !self.is_allowed(&location) {
                debug!(
                    path = %path.display(),
                    location = %location.display(),
                    "hiding symlink target outside session grant"
                );
                return Err(VfsError::NotFound(path.display().to_string()));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Vfs for ScopedVfs {
    fn root(&self) -> &Path {
        &self.root_path
    }

    fn resolve_path(&self, candidate: &str) -> VfsResult<PathBuf> {
        let resolved = self.inner.resolve_path(candidate)?;

        if self.is_allowed(&resolved) {
            Ok(resolved)
        } else {
            Ok(Self::blackhole(&resolved))
        }
    }

    async fn stat(&self, path: &Path) -> VfsResult<VfsMetadata> {
        self.reveal(path, true).await?;
        self.inner.stat(path).await
    }

    async fn lstat(&self, path: &Path) -> VfsResult<VfsMetadata> {
        self.reveal(path, false).await?;
        self.inner.lstat(path).await
    }

    async fn read_dir(&self, path: &Path) -> VfsResult<DirListing> {
        self.reveal(path, true).await?;
        let mut listing = self.inner.read_dir(path).await?;

        let base_path = listing.base_path.clone();
        listing
            .entries
            .retain(|entry| entry.is_dot_entry() || self.is_allowed(&base_path.join(&entry.name)));

        Ok(listing)
    }

    async fn mkdir(&self, path: &Path) -> VfsResult<()> {
        self.reveal(path, false).await?;
        self.inner.mkdir(path).await
    }

    async fn rmdir(&self, path: &Path) -> VfsResult<()> {
        self.reveal(path, false).await?;
        self.inner.rmdir(path).await
    }

    async fn remove(&self, path: &Path) -> VfsResult<()> {
        self.reveal(path, false).await?;
        self.inner.remove(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        self.reveal(from, false).await?;
        self.reveal(to, false).await?;
        self.inner.rename(from, to).await
    }

    async fn read_link(&self, path: &Path) -> VfsResult<PathBuf> {
        self.reveal(path, false).await?;
        self.inner.read_link(path).await
    }

    async fn real_path(&self, path: &Path) -> VfsResult<PathBuf> {
        self.reveal(path, true).await?;
        self.inner.real_path(path).await
    }

    async fn open(&self, path: &Path, flags: OpenFlags) -> VfsResult<FileHandle> {
        self.reveal(path, true).await?;
        self.inner.open(path, flags).await
    }

    async fn read(&self, handle: &FileHandle, offset: u64, len: usize) -> VfsResult<Vec<u8>> {
        self.inner.read(handle, offset, len).await
    }

    async fn write(&self, handle: &FileHandle, offset: u64, content: &[u8]) -> VfsResult<()> {
        self.inner.write(handle, offset, content).await
    }

    async fn fstat(&self, handle: &FileHandle) -> VfsResult<VfsMetadata> {
        self.inner.fstat(handle).await
    }

    async fn set_len(&self, handle: &FileHandle, len: u64) -> VfsResult<()> {
        self.inner.set_len(handle, len).await
    }

    async fn close(&self, handle: &FileHandle) -> VfsResult<()> {
        self.inner.close(handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HostVfs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("client-a/archive")).unwrap();
        std::fs::write(root.join("client-a/report.txt"), b"a").unwrap();
        std::fs::write(root.join("client-a/archive/old.txt"), b"old").unwrap();
        std::fs::create_dir_all(root.join("client-b")).unwrap();
        std::fs::write(root.join("client-b/secret.txt"), b"b").unwrap();
        std::fs::create_dir_all(root.join("client-ab")).unwrap();
        std::fs::write(root.join("top.txt"), b"t").unwrap();
        dir
    }

    fn scoped(dir: &tempfile::TempDir, grants: &[&str]) -> ScopedVfs {
        let host = HostVfs::new(dir.path()).unwrap();
        ScopedVfs::new(Box::new(host), grants.iter().copied())
    }

    #[test]
    fn test_is_allowed() {
        let dir = tree();
        let vfs = scoped(&dir, &["client-a"]);
        let root = dir.path();

        assert!(vfs.is_allowed(root));
        assert!(vfs.is_allowed(&root.join("client-a")));
        assert!(vfs.is_allowed(&root.join("client-a/")));
        assert!(vfs.is_allowed(&root.join("client-a/archive/old.txt")));
        assert!(!vfs.is_allowed(&root.join("client-b")));
        assert!(!vfs.is_allowed(&root.join("client-ab")));
        assert!(!vfs.is_allowed(&root.join("top.txt")));
    }

    #[test]
    fn test_resolve_allowed_path_unchanged() {
        let dir = tree();
        let vfs = scoped(&dir, &["client-a"]);

        let resolved = vfs.resolve_path("/client-a/report.txt").unwrap();
        assert_eq!(resolved, dir.path().join("client-a/report.txt"));
        assert_eq!(vfs.resolve_path("/").unwrap(), dir.path());
    }

    #[test]
    fn test_resolve_disallowed_path_is_stable_blackhole() {
        let dir = tree();
        let vfs = scoped(&dir, &["client-a"]);

        let first = vfs.resolve_path("/client-b/secret.txt").unwrap();
        let second = vfs.resolve_path("client-b/../client-b/secret.txt").unwrap();

        assert!(first.starts_with(BLACKHOLE_PREFIX));
        assert!(first.ends_with("client-b/secret.txt"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_listing_hides_disallowed_entries() {
        let dir = tree();
        let vfs = scoped(&dir, &["client-a"]);

        let root = vfs.resolve_path("/").unwrap();
        for _ in 0..2 {
            let listing = vfs.read_dir(&root).await.unwrap();
            assert_eq!(listing.names(), vec![".", "..", "client-a"]);
            assert_eq!(listing.base_path, root);
        }
    }

    #[tokio::test]
    async fn test_listing_keeps_metadata() {
        let dir = tree();
        let vfs = scoped(&dir, &["client-a"]);

        let path = vfs.resolve_path("/client-a").unwrap();
        let listing = vfs.read_dir(&path).await.unwrap();
        assert_eq!(listing.names(), vec![".", "..", "archive", "report.txt"]);

        let report = listing.entries.iter().find(|e| e.name == "report.txt").unwrap();
        assert_eq!(report.metadata.as_ref().unwrap().size, 1);
    }

    #[tokio::test]
    async fn test_disallowed_open_is_not_found() {
        let dir = tree();
        let vfs = scoped(&dir, &["client-a"]);

        let path = vfs.resolve_path("/client-b/secret.txt").unwrap();
        let err = vfs.open(&path, OpenFlags::read_only()).await.unwrap_err();
        assert!(err.is_not_found(), "expected not-found, got {err:?}");

        let listing = vfs.resolve_path("/client-b").unwrap();
        assert!(vfs.read_dir(&listing).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_unresolved_disallowed_path_is_not_found() {
        let dir = tree();
        let vfs = scoped(&dir, &["client-a"]);

        let err = vfs
            .stat(&dir.path().join("client-b/secret.txt"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_descendants_are_readable() {
        let dir = tree();
        let vfs = scoped(&dir, &["client-a"]);

        let path = vfs.resolve_path("client-a/archive/old.txt").unwrap();
        let handle = vfs.open(&path, OpenFlags::read_only()).await.unwrap();
        assert_eq!(vfs.read(&handle, 0, 16).await.unwrap(), b"old");
        vfs.close(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_cannot_create_outside_grant() {
        let dir = tree();
        let vfs = scoped(&dir, &["client-a"]);

        let path = vfs.resolve_path("/new-dir").unwrap();
        assert!(vfs.mkdir(&path).await.unwrap_err().is_not_found());
        assert!(!dir.path().join("new-dir").exists());

        let path = vfs.resolve_path("/client-a/new-dir").unwrap();
        vfs.mkdir(&path).await.unwrap();
        assert!(dir.path().join("client-a/new-dir").is_dir());
    }

    #[tokio::test]
    async fn test_rename_into_hidden_path_is_not_found() {
        let dir = tree();
        let vfs = scoped(&dir, &["client-a"]);

        let from = vfs.resolve_path("/client-a/report.txt").unwrap();
        let to = vfs.resolve_path("/client-b/report.txt").unwrap();
        assert!(vfs.rename(&from, &to).await.unwrap_err().is_not_found());
        assert!(dir.path().join("client-a/report.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_into_hidden_sibling_is_not_found() {
        let dir = tree();
        std::os::unix::fs::symlink("../client-b", dir.path().join("client-a/peek")).unwrap();
        let vfs = scoped(&dir, &["client-a"]);

        let path = vfs.resolve_path("/client-a/peek/secret.txt").unwrap();
        let err = vfs.open(&path, OpenFlags::read_only()).await.unwrap_err();
        assert!(err.is_not_found(), "expected not-found, got {err:?}");

        let link = vfs.resolve_path("/client-a/peek").unwrap();
        assert!(vfs.read_dir(&link).await.unwrap_err().is_not_found());
        // The link entry itself is inside the grant.
        assert!(vfs.lstat(&link).await.unwrap().is_symlink);
    }
}
