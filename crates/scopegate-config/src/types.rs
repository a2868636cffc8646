//! Configuration types for scopegate.
//!
//! Every struct implements [`Default`] so a bare `[section]` header in TOML
//! deserializes. Fields left empty are candidates for environment fallbacks
//! (see [`crate::env`]).

use std::path::PathBuf;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Externally reachable address and the served directory.
    pub server: ServerSection,
    /// Logging level, format and per-crate directives.
    pub logging: LoggingSection,
    /// Legacy mode: one credential shared by every allowed origin.
    pub single_tenant: Option<SingleTenantSection>,
    /// Per-origin credential and path policy. Order is significant: the
    /// first pattern matching an origin wins.
    pub origins: Vec<OriginSection>,
}

/// Which trust model the configuration selects.
#[derive(Debug, Clone, Copy)]
pub enum Tenancy<'a> {
    /// One credential for all allowed origins, no path ceiling.
    Single(&'a SingleTenantSection),
    /// Per-origin credentials and allowed paths.
    Multi(&'a [OriginSection]),
}

impl Config {
    /// The trust model selected by this configuration, if any.
    ///
    /// Returns `None` when no origin policy is configured at all. When both
    /// sections are present the multi-tenant map is reported; validation
    /// rejects that combination before it is used.
    #[must_use]
    pub fn tenancy(&self) -> Option<Tenancy<'_>> {
        if !self.origins.is_empty() {
            return Some(Tenancy::Multi(&self.origins));
        }
        match &self.single_tenant {
            Some(single) if !single.allowed_origins.is_empty() => Some(Tenancy::Single(single)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerSection
// ---------------------------------------------------------------------------

/// Where the service is reachable and what it serves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// External `host:port` (no scheme). Tokens must name it as audience.
    pub app_host: String,
    /// Absolute directory presented to sessions as `/`.
    pub virtual_root: PathBuf,
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level filter; `info` when unset.
    pub level: Option<String>,
    /// One of `pretty`, `compact`, `json`, `full`.
    pub format: Option<String>,
    /// Extra `EnvFilter` directives (e.g. `scopegate_vfs=debug`).
    pub directives: Vec<String>,
    /// Write daily-rotated files here instead of stderr.
    pub directory: Option<PathBuf>,
}

impl LoggingSection {
    /// Effective log level.
    #[must_use]
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("info")
    }

    /// Effective log format name.
    #[must_use]
    pub fn format(&self) -> &str {
        self.format.as_deref().unwrap_or("compact")
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Verification material as written in configuration.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource<'a> {
    /// Base64-encoded HMAC shared secret.
    Secret(&'a str),
    /// PEM-encoded RSA public key.
    PublicKey(&'a str),
}

impl std::fmt::Debug for CredentialSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Secret(_) => f.write_str("Secret(<redacted>)"),
            Self::PublicKey(_) => f.write_str("PublicKey(<pem>)"),
        }
    }
}

fn credential_source<'a>(
    secret: Option<&'a String>,
    public_key: Option<&'a String>,
) -> Option<CredentialSource<'a>> {
    match (secret, public_key) {
        (Some(s), _) if !s.trim().is_empty() => Some(CredentialSource::Secret(s)),
        (_, Some(k)) if !k.trim().is_empty() => Some(CredentialSource::PublicKey(k)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// SingleTenantSection
// ---------------------------------------------------------------------------

/// Legacy single-credential trust model.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct SingleTenantSection {
    /// Regular expressions over the `Origin` header.
    pub allowed_origins: Vec<String>,
    /// Base64 HMAC secret.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    /// PEM RSA public key.
    pub public_key: Option<String>,
}

impl SingleTenantSection {
    /// The configured credential, if any.
    #[must_use]
    pub fn credential(&self) -> Option<CredentialSource<'_>> {
        credential_source(self.secret.as_ref(), self.public_key.as_ref())
    }
}

impl std::fmt::Debug for SingleTenantSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleTenantSection")
            .field("allowed_origins", &self.allowed_origins)
            .field("has_secret", &self.secret.is_some())
            .field("has_public_key", &self.public_key.is_some())
            .finish()
    }
}

impl Serialize for SingleTenantSection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SingleTenantSection", 2)?;
        state.serialize_field("allowed_origins", &self.allowed_origins)?;
        state.serialize_field("public_key", &self.public_key)?;
        state.end()
    }
}

// ---------------------------------------------------------------------------
// OriginSection
// ---------------------------------------------------------------------------

/// Policy for one origin pattern.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct OriginSection {
    /// Regular expression over the full `Origin` header value.
    pub pattern: String,
    /// Base64 HMAC secret.
    pub secret: Option<String>,
    /// PEM RSA public key.
    pub public_key: Option<String>,
    /// Root-relative paths tokens from this origin may be granted.
    pub allowed_paths: Vec<String>,
}

impl OriginSection {
    /// The configured credential, if any.
    #[must_use]
    pub fn credential(&self) -> Option<CredentialSource<'_>> {
        credential_source(self.secret.as_ref(), self.public_key.as_ref())
    }
}

impl std::fmt::Debug for OriginSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OriginSection")
            .field("pattern", &self.pattern)
            .field("has_secret", &self.secret.is_some())
            .field("has_public_key", &self.public_key.is_some())
            .field("allowed_paths", &self.allowed_paths)
            .finish()
    }
}

impl Serialize for OriginSection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("OriginSection", 3)?;
        state.serialize_field("pattern", &self.pattern)?;
        state.serialize_field("public_key", &self.public_key)?;
        state.serialize_field("allowed_paths", &self.allowed_paths)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenancy_none_by_default() {
        assert!(Config::default().tenancy().is_none());
    }

    #[test]
    fn test_tenancy_single_requires_origins() {
        let config = Config {
            single_tenant: Some(SingleTenantSection {
                secret: Some("c2VjcmV0".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(config.tenancy().is_none());
    }

    #[test]
    fn test_credential_prefers_secret_and_ignores_blank() {
        let origin = OriginSection {
            secret: Some("  ".into()),
            public_key: Some("-----BEGIN PUBLIC KEY-----".into()),
            ..Default::default()
        };
        assert!(matches!(
            origin.credential(),
            Some(CredentialSource::PublicKey(_))
        ));

        let origin = OriginSection::default();
        assert!(origin.credential().is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let origin = OriginSection {
            pattern: "https://a\\.example".into(),
            secret: Some("dG9wLXNlY3JldA==".into()),
            ..Default::default()
        };
        let debug = format!("{origin:?}");
        assert!(!debug.contains("dG9wLXNlY3JldA=="));
        assert!(debug.contains("has_secret: true"));

        let cred = format!("{:?}", origin.credential());
        assert!(!cred.contains("dG9wLXNlY3JldA=="));
    }

    #[test]
    fn test_serialize_omits_secret() {
        let single = SingleTenantSection {
            allowed_origins: vec!["https://a\\.example".into()],
            secret: Some("dG9wLXNlY3JldA==".into()),
            public_key: None,
        };
        let json = serde_json::to_string(&single).unwrap();
        assert!(!json.contains("dG9wLXNlY3JldA=="));
        assert!(json.contains("allowed_origins"));
    }
}
