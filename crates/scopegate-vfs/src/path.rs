use crate::{VfsError, VfsResult};
use std::path::{Component, Path, PathBuf};

/// Lexically resolves a client path against a jail root.
///
/// The client sees `root` as `/`: a leading separator is ignored, `.` is
/// dropped and `..` pops one level but never above `root` (the same way `cd ..`
/// behaves at `/`). An empty candidate resolves to the root itself.
///
/// Does NOT touch the filesystem, so the result is stable for identical inputs.
///
/// # Errors
///
/// Returns `VfsError::InvalidPath` if the candidate contains a NUL byte.
pub fn resolve_path(base_root: &Path, request_path: &str) -> VfsResult<PathBuf> {
    if request_path.contains('\0') {
        return Err(VfsError::InvalidPath(
            "Path contains an embedded NUL byte".into(),
        ));
    }

    let mut resolved = base_root.to_path_buf();

    for component in Path::new(request_path).components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {},
            Component::ParentDir => {
                if resolved != base_root {
                    resolved.pop();
                }
            },
            Component::Normal(p) => {
                resolved.push(p);
            },
        }
    }

    Ok(resolved)
}

/// Returns true if every component of `path` is a plain name (no root, no
/// `.`/`..`, not empty).
#[must_use]
pub fn is_plain_relative(path: &str) -> bool {
    let p = Path::new(path);
    !path.is_empty() && p.components().all(|c| matches!(c, Component::Normal(_)))
}
