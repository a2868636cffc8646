use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock, Semaphore};

use crate::path::resolve_path;
use crate::{
    DirListing, FileHandle, OpenFlags, Vfs, VfsDirEntry, VfsError, VfsMetadata, VfsResult,
};

/// Maximum number of files a single session may hold open.
const MAX_OPEN_FILES: usize = 64;

/// Largest chunk returned by a single `read` call (256 KiB).
const MAX_READ_CHUNK: usize = 256 * 1024;

/// An implementation of `Vfs` backed by the physical host filesystem, jailed
/// to a root directory.
pub struct HostVfs {
    root: PathBuf,
    open_files: RwLock<HashMap<FileHandle, Arc<Mutex<fs::File>>>>,
    fd_semaphore: Arc<Semaphore>,
}

impl HostVfs {
    /// Create a new host VFS presenting `root` as `/`.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::InvalidPath` if `root` is relative or contains `..`.
    pub fn new(root: impl Into<PathBuf>) -> VfsResult<Self> {
        let root = root.into();
        if !root.is_absolute() {
            return Err(VfsError::InvalidPath(format!(
                "VFS root must be absolute: {}",
                root.display()
            )));
        }
        if root.components().any(|c| c == Component::ParentDir) {
            return Err(VfsError::InvalidPath(format!(
                "VFS root must not contain '..': {}",
                root.display()
            )));
        }
        let root = root
            .components()
            .filter(|c| *c != Component::CurDir)
            .collect();

        Ok(Self {
            root,
            open_files: RwLock::new(HashMap::new()),
            fd_semaphore: Arc::new(Semaphore::new(MAX_OPEN_FILES)),
        })
    }

    /// Map a resolved path onto the physical path to operate on.
    ///
    /// Paths outside the root do not exist as far as this VFS is concerned.
    /// The deepest existing ancestor is canonicalized so a symlink cannot
    /// carry the operation out of the root; with `follow_final == false` the
    /// last component is left untouched (for `lstat`, `remove`, ...).
    async fn confine(&self, path: &Path, follow_final: bool) -> VfsResult<PathBuf> {
        if !path.starts_with(&self.root) {
            return Err(VfsError::NotFound(path.display().to_string()));
        }

        let canonical_root = fs::canonicalize(&self.root)
            .await
            .unwrap_or_else(|_| self.root.clone());

        let mut current_check = path.to_path_buf();
        let mut unexisting_components = Vec::new();

        if !follow_final && path != self.root {
            if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
                unexisting_components.push(name.to_owned());
                current_check = parent.to_path_buf();
            }
        }

        loop {
            if !current_check.starts_with(&self.root) {
                // Nothing exists at or below the root.
                return Err(VfsError::NotFound(path.display().to_string()));
            }

            if fs::symlink_metadata(&current_check).await.is_ok() {
                let canonical = fs::canonicalize(&current_check).await?;
                if !canonical.starts_with(&canonical_root) {
                    return Err(VfsError::SandboxViolation(
                        "Path resolves outside the root via symlink".into(),
                    ));
                }

                // Rebuild from the canonical prefix so a symlink swapped in
                // after this check cannot redirect the operation.
                let mut final_path = canonical;
                for comp in unexisting_components.into_iter().rev() {
                    final_path.push(comp);
                }
                return Ok(final_path);
            }

            match (current_check.parent(), current_check.file_name()) {
                (Some(parent), Some(file_name)) => {
                    unexisting_components.push(file_name.to_owned());
                    current_check = parent.to_path_buf();
                },
                _ => break,
            }
        }

        Err(VfsError::NotFound(path.display().to_string()))
    }

    fn ensure_not_root(&self, path: &Path) -> VfsResult<()> {
        if path == self.root {
            return Err(VfsError::RootProtected);
        }
        Ok(())
    }

    async fn file(&self, handle: &FileHandle) -> VfsResult<Arc<Mutex<fs::File>>> {
        let files = self.open_files.read().await;
        files.get(handle).cloned().ok_or(VfsError::InvalidHandle)
    }
}

#[async_trait]
impl Vfs for HostVfs {
    fn root(&self) -> &Path {
        &self.root
    }

    fn resolve_path(&self, candidate: &str) -> VfsResult<PathBuf> {
        resolve_path(&self.root, candidate)
    }

    async fn stat(&self, path: &Path) -> VfsResult<VfsMetadata> {
        let target = self.confine(path, true).await?;
        let metadata = fs::metadata(&target).await?;
        Ok(VfsMetadata::from(&metadata))
    }

    async fn lstat(&self, path: &Path) -> VfsResult<VfsMetadata> {
        let target = self.confine(path, false).await?;
        let metadata = fs::symlink_metadata(&target).await?;
        Ok(VfsMetadata::from(&metadata))
    }

    async fn read_dir(&self, path: &Path) -> VfsResult<DirListing> {
        let target = self.confine(path, true).await?;
        let mut read_dir = fs::read_dir(&target).await?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            // Broken symlinks or permission errors still get listed.
            let metadata = fs::symlink_metadata(entry.path())
                .await
                .ok()
                .map(|m| VfsMetadata::from(&m));
            entries.push(VfsDirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                metadata,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let self_meta = fs::metadata(&target).await.ok();
        let parent_meta = if path == self.root {
            self_meta.clone()
        } else {
            match target.parent() {
                Some(parent) => fs::metadata(parent).await.ok(),
                None => None,
            }
        };

        let mut listing = Vec::with_capacity(entries.len().saturating_add(2));
        listing.push(VfsDirEntry {
            name: ".".into(),
            metadata: self_meta.as_ref().map(VfsMetadata::from),
        });
        listing.push(VfsDirEntry {
            name: "..".into(),
            metadata: parent_meta.as_ref().map(VfsMetadata::from),
        });
        listing.extend(entries);

        Ok(DirListing {
            base_path: path.to_path_buf(),
            entries: listing,
        })
    }

    async fn mkdir(&self, path: &Path) -> VfsResult<()> {
        self.ensure_not_root(path)?;
        let target = self.confine(path, false).await?;
        fs::create_dir(&target).await.map_err(VfsError::from)
    }

    async fn rmdir(&self, path: &Path) -> VfsResult<()> {
        self.ensure_not_root(path)?;
        let target = self.confine(path, false).await?;
        fs::remove_dir(&target).await.map_err(VfsError::from)
    }

    async fn remove(&self, path: &Path) -> VfsResult<()> {
        self.ensure_not_root(path)?;
        let target = self.confine(path, false).await?;
        fs::remove_file(&target).await.map_err(VfsError::from)
    }

    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        self.ensure_not_root(from)?;
        self.ensure_not_root(to)?;
        let source = self.confine(from, false).await?;
        let dest = self.confine(to, false).await?;
        fs::rename(&source, &dest).await.map_err(VfsError::from)
    }

    async fn read_link(&self, path: &Path) -> VfsResult<PathBuf> {
        let target = self.confine(path, false).await?;
        fs::read_link(&target).await.map_err(VfsError::from)
    }

    async fn real_path(&self, path: &Path) -> VfsResult<PathBuf> {
        let target = self.confine(path, true).await?;
        fs::canonicalize(&target).await.map_err(VfsError::from)
    }

    async fn open(&self, path: &Path, flags: OpenFlags) -> VfsResult<FileHandle> {
        let target = self.confine(path, true).await?;

        // Prevent FD exhaustion via semaphore before calling the OS
        let permit = self
            .fd_semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|_| VfsError::TooManyOpenFiles(MAX_OPEN_FILES))?;

        let file = fs::OpenOptions::new()
            .read(flags.read || !flags.write)
            .write(flags.write || flags.append)
            .append(flags.append)
            .create(flags.create && !flags.exclusive)
            .create_new(flags.exclusive)
            .truncate(flags.truncate)
            .open(&target)
            .await?;

        let new_handle = FileHandle::new();
        self.open_files
            .write()
            .await
            .insert(new_handle.clone(), Arc::new(Mutex::new(file)));

        // Tie the permit to the handle's lifetime; it is returned in close().
        permit.forget();

        Ok(new_handle)
    }

    async fn read(&self, handle: &FileHandle, offset: u64, len: usize) -> VfsResult<Vec<u8>> {
        let file_arc = self.file(handle).await?;
        let mut file = file_arc.lock().await;

        file.seek(SeekFrom::Start(offset)).await?;

        let limit = len.min(MAX_READ_CHUNK);
        let mut buffer = Vec::with_capacity(limit);
        (&mut *file)
            .take(limit as u64)
            .read_to_end(&mut buffer)
            .await?;

        Ok(buffer)
    }

    async fn write(&self, handle: &FileHandle, offset: u64, content: &[u8]) -> VfsResult<()> {
        let file_arc = self.file(handle).await?;
        let mut file = file_arc.lock().await;

        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(content).await?;
        file.flush().await?;
        Ok(())
    }

    async fn fstat(&self, handle: &FileHandle) -> VfsResult<VfsMetadata> {
        let file_arc = self.file(handle).await?;
        let file = file_arc.lock().await;
        let metadata = file.metadata().await?;
        Ok(VfsMetadata::from(&metadata))
    }

    async fn set_len(&self, handle: &FileHandle, len: u64) -> VfsResult<()> {
        let file_arc = self.file(handle).await?;
        let file = file_arc.lock().await;
        file.set_len(len).await.map_err(VfsError::from)
    }

    async fn close(&self, handle: &FileHandle) -> VfsResult<()> {
        let mut files = self.open_files.write().await;
        if files.remove(handle).is_none() {
            return Err(VfsError::InvalidHandle);
        }
        self.fd_semaphore.add_permits(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(dir: &tempfile::TempDir) -> HostVfs {
        HostVfs::new(dir.path()).unwrap()
    }

    #[test]
    fn test_relative_root_rejected() {
        assert!(matches!(
            HostVfs::new("srv/files"),
            Err(VfsError::InvalidPath(_))
        ));
        assert!(matches!(
            HostVfs::new("/srv/../files"),
            Err(VfsError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = host(&dir);

        let path = vfs.resolve_path("/notes.txt").unwrap();
        let handle = vfs.open(&path, OpenFlags::create_truncate()).await.unwrap();
        vfs.write(&handle, 0, b"hello world").await.unwrap();
        vfs.close(&handle).await.unwrap();

        let handle = vfs.open(&path, OpenFlags::read_only()).await.unwrap();
        assert_eq!(vfs.read(&handle, 6, 100).await.unwrap(), b"world");
        assert_eq!(vfs.fstat(&handle).await.unwrap().size, 11);
        vfs.close(&handle).await.unwrap();

        assert!(matches!(
            vfs.close(&handle).await,
            Err(VfsError::InvalidHandle)
        ));
    }

    #[tokio::test]
    async fn test_read_dir_has_dot_entries_and_sorted_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("c.txt"), b"x").unwrap();
        let vfs = host(&dir);

        let root = vfs.resolve_path("/").unwrap();
        let listing = vfs.read_dir(&root).await.unwrap();

        assert_eq!(listing.base_path, root);
        assert_eq!(listing.names(), vec![".", "..", "a", "b", "c.txt"]);
        let file = &listing.entries[4];
        assert!(file.metadata.as_ref().unwrap().is_file);
    }

    #[tokio::test]
    async fn test_path_outside_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = host(&dir);

        let err = vfs.stat(Path::new("/blackhole/jail/etc")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = host(&dir);

        let path = vfs.resolve_path("missing/file.txt").unwrap();
        let err = vfs.open(&path, OpenFlags::read_only()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_root_cannot_be_removed() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = host(&dir);

        let root = vfs.resolve_path("/").unwrap();
        assert!(matches!(
            vfs.rmdir(&root).await,
            Err(VfsError::RootProtected)
        ));
    }

    #[tokio::test]
    async fn test_mkdir_rename_remove() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = host(&dir);

        let sub = vfs.resolve_path("sub").unwrap();
        vfs.mkdir(&sub).await.unwrap();
        assert!(vfs.stat(&sub).await.unwrap().is_dir);

        let from = vfs.resolve_path("sub/a.txt").unwrap();
        let to = vfs.resolve_path("sub/b.txt").unwrap();
        let handle = vfs.open(&from, OpenFlags::create_truncate()).await.unwrap();
        vfs.close(&handle).await.unwrap();
        vfs.rename(&from, &to).await.unwrap();
        assert!(vfs.stat(&from).await.unwrap_err().is_not_found());

        vfs.remove(&to).await.unwrap();
        vfs.rmdir(&sub).await.unwrap();
        assert!(vfs.stat(&sub).await.unwrap_err().is_not_found());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_blocked() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), b"secret").unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();
        let vfs = host(&dir);

        let path = vfs.resolve_path("escape/secret.txt").unwrap();
        assert!(matches!(
            vfs.open(&path, OpenFlags::read_only()).await,
            Err(VfsError::SandboxViolation(_))
        ));

        // The link itself can still be inspected without being followed.
        let link = vfs.resolve_path("escape").unwrap();
        assert!(vfs.lstat(&link).await.unwrap().is_symlink);
    }
}
