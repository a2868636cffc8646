//! Origin matching.
//!
//! Patterns are regular expressions that must match the entire `Origin`
//! header value; `https://a\.example` does not admit
//! `https://a.example.evil.com`.

use regex::Regex;
use scopegate_config::anchor_pattern;

use crate::error::{AuthError, AuthResult};

/// A compiled origin pattern.
#[derive(Debug, Clone)]
pub struct OriginPattern {
    source: String,
    regex: Regex,
}

impl OriginPattern {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidPattern`] if the pattern is empty or is
    /// not a valid regular expression.
    pub fn new(pattern: &str) -> AuthResult<Self> {
        if pattern.is_empty() {
            return Err(AuthError::InvalidPattern {
                pattern: String::new(),
                reason: "pattern is empty".to_owned(),
            });
        }
        let regex = Regex::new(&anchor_pattern(pattern)).map_err(|e| AuthError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: pattern.to_owned(),
            regex,
        })
    }

    /// The pattern as configured.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `origin` matches in full.
    #[must_use]
    pub fn is_match(&self, origin: &str) -> bool {
        self.regex.is_match(origin)
    }
}

/// An ordered list of origin patterns.
#[derive(Debug, Clone, Default)]
pub struct OriginMatcher {
    patterns: Vec<OriginPattern>,
}

impl OriginMatcher {
    /// Compile patterns, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns the first pattern that fails to compile.
    pub fn new<I, S>(patterns: I) -> AuthResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| OriginPattern::new(p.as_ref()))
            .collect::<AuthResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Index of the first pattern matching `origin`.
    ///
    /// A missing or empty origin never matches.
    #[must_use]
    pub fn find(&self, origin: Option<&str>) -> Option<usize> {
        let origin = origin.filter(|o| !o.is_empty())?;
        self.patterns.iter().position(|p| p.is_match(origin))
    }

    /// The first pattern matching `origin`.
    #[must_use]
    pub fn matches(&self, origin: Option<&str>) -> Option<&OriginPattern> {
        self.find(origin).and_then(|i| self.patterns.get(i))
    }

    /// Pattern at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&OriginPattern> {
        self.patterns.get(index)
    }

    /// Number of patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether there are no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Iterate over the patterns in order.
    pub fn iter(&self) -> impl Iterator<Item = &OriginPattern> {
        self.patterns.iter()
    }
}
