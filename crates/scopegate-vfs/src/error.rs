//! Filesystem errors.
//!
//! Anything a client should not learn about is reported as
//! [`VfsError::NotFound`]; the other variants are for paths the session is
//! allowed to see.

use thiserror::Error;

/// Errors from [`Vfs`](crate::Vfs) operations.
#[derive(Debug, Error)]
pub enum VfsError {
    /// A symlink inside the root leads outside it.
    #[error("symlink escapes the served root: {0}")]
    SandboxViolation(String),

    /// The path cannot be used at all (embedded NUL byte, relative root, ...).
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The handle was never issued by this filesystem or is already closed.
    #[error("unknown file handle")]
    InvalidHandle,

    /// The session holds the maximum number of open files.
    #[error("too many open files (limit {0})")]
    TooManyOpenFiles(usize),

    /// The operation would modify or remove the served root itself.
    #[error("refusing to modify the root directory")]
    RootProtected,

    /// The path does not exist or is hidden from the session.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// Error reported by the operating system.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VfsError {
    /// Whether the path is absent as far as the client can tell, whether
    /// hidden by a view or missing on disk.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result alias for filesystem operations.
pub type VfsResult<T> = Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        assert!(VfsError::NotFound("/x".into()).is_not_found());
        assert!(
            VfsError::from(std::io::Error::from(std::io::ErrorKind::NotFound)).is_not_found()
        );
        assert!(!VfsError::RootProtected.is_not_found());
        assert!(!VfsError::InvalidHandle.is_not_found());
    }
}
