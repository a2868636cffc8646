//! Per-session grant.

use std::path::{Path, PathBuf};

use scopegate_vfs::path::is_plain_relative;
use thiserror::Error;

/// A grant entry that would escape or re-enter the root.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("grant entry '{0}' is not a plain relative path")]
pub struct InvalidGrantPath(pub String);

/// The verified outcome of one admission: the session's root and the paths
/// it may observe below it. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    root: PathBuf,
    authorized_paths: Vec<String>,
    subject: Option<String>,
}

impl SessionGrant {
    /// Build a grant, rejecting entries that are empty, absolute, or contain
    /// `.`/`..`. Duplicates are dropped, first occurrence kept.
    ///
    /// # Errors
    ///
    /// Returns the first offending entry.
    pub fn new(
        root: impl Into<PathBuf>,
        authorized_paths: &[String],
    ) -> Result<Self, InvalidGrantPath> {
        let mut paths: Vec<String> = Vec::with_capacity(authorized_paths.len());
        for path in authorized_paths {
            if !is_plain_relative(path) || path.split('/').any(|seg| seg == "." || seg == "..") {
                return Err(InvalidGrantPath(path.clone()));
            }
            if !paths.contains(path) {
                paths.push(path.clone());
            }
        }
        Ok(Self {
            root: root.into(),
            authorized_paths: paths,
            subject: None,
        })
    }

    /// Attach the token subject.
    #[must_use]
    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject;
        self
    }

    /// Absolute root of the session.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root-relative granted paths.
    #[must_use]
    pub fn authorized_paths(&self) -> &[String] {
        &self.authorized_paths
    }

    /// Token subject, if the token carried one.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_valid_grant() {
        let g = SessionGrant::new("/srv/files", &paths(&["client-a", "shared/docs"])).unwrap();
        assert_eq!(g.root(), Path::new("/srv/files"));
        assert_eq!(g.authorized_paths(), ["client-a", "shared/docs"]);
        assert!(g.subject().is_none());
    }

    #[test]
    fn test_rejects_escaping_entries() {
        for bad in ["", "/etc", "..", "../x", "a/../b", "./a", "a/./b"] {
            assert_eq!(
                SessionGrant::new("/srv/files", &paths(&["ok", bad])),
                Err(InvalidGrantPath(bad.to_owned())),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_duplicates_dropped() {
        let g = SessionGrant::new("/r", &paths(&["a", "b", "a"])).unwrap();
        assert_eq!(g.authorized_paths(), ["a", "b"]);
    }

    #[test]
    fn test_subject() {
        let g = SessionGrant::new("/r", &paths(&["a"]))
            .unwrap()
            .with_subject(Some("user-1".into()));
        assert_eq!(g.subject(), Some("user-1"));
    }
}
