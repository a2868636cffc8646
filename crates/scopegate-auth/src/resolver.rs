//! Credential resolution strategies.
//!
//! A resolver owns the origin patterns and, for a matched origin, yields the
//! credential that verifies its tokens plus the origin's allowed paths.
//! Matching and lookup are separate steps so an unmatched origin never
//! reaches the credential table.

use std::sync::Arc;

use scopegate_config::{Config, OriginSection, SingleTenantSection, Tenancy};
use tracing::{error, warn};

use crate::credential::Credential;
use crate::error::{AuthError, AuthResult};
use crate::origin::OriginMatcher;
use crate::policy::PathPolicyEnforcer;

/// What a matched origin resolves to.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The configured pattern that matched.
    pub pattern: String,
    /// Credential verifying tokens from this origin.
    pub credential: Arc<Credential>,
    /// The origin's ceiling on grants. `None` means the strategy has no
    /// path restriction concept; `Some(empty)` means nothing is allowed.
    pub allowed_paths: Option<Arc<[String]>>,
}

/// Strategy mapping origins to credentials and path policy.
pub trait CredentialResolver: Send + Sync {
    /// The ordered origin patterns this resolver trusts.
    fn matcher(&self) -> &OriginMatcher;

    /// Look up the entry for the pattern at `index` (as found by the matcher).
    fn lookup(&self, index: usize) -> Option<Resolution>;

    /// The path policy that goes with this strategy, if any.
    fn path_policy(&self) -> Option<PathPolicyEnforcer>;

    /// Match `origin` and look up its entry in one step.
    fn resolve(&self, origin: Option<&str>) -> Option<Resolution> {
        let index = self.matcher().find(origin)?;
        self.lookup(index)
    }
}

/// One credential for every allowed origin; no path ceiling.
#[derive(Debug)]
pub struct SingleTenantResolver {
    matcher: OriginMatcher,
    credential: Arc<Credential>,
}

impl SingleTenantResolver {
    /// Create a resolver from origin patterns and the shared credential.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidPattern`] if a pattern fails to compile.
    pub fn new<I, S>(allowed_origins: I, credential: Credential) -> AuthResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            matcher: OriginMatcher::new(allowed_origins)?,
            credential: Arc::new(credential),
        })
    }

    /// Build from the `[single_tenant]` section.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern or the key is invalid, or no key is set.
    pub fn from_section(section: &SingleTenantSection) -> AuthResult<Self> {
        let source = section.credential().ok_or_else(|| AuthError::InvalidKey {
            origin: "single_tenant".to_owned(),
            reason: "no secret or public key configured".to_owned(),
        })?;
        let credential = Credential::from_source("single_tenant", &source)?;
        Self::new(&section.allowed_origins, credential)
    }
}

impl CredentialResolver for SingleTenantResolver {
    fn matcher(&self) -> &OriginMatcher {
        &self.matcher
    }

    fn lookup(&self, index: usize) -> Option<Resolution> {
        let pattern = self.matcher.get(index)?;
        Some(Resolution {
            pattern: pattern.as_str().to_owned(),
            credential: Arc::clone(&self.credential),
            allowed_paths: None,
        })
    }

    fn path_policy(&self) -> Option<PathPolicyEnforcer> {
        None
    }
}

/// One tenant of a [`MultiTenantResolver`].
#[derive(Debug, Clone)]
pub struct TenantPolicy {
    /// Origin pattern.
    pub pattern: String,
    /// Verification key; `None` is a configuration problem.
    pub credential: Option<Arc<Credential>>,
    /// Paths tokens from this origin may be granted.
    pub allowed_paths: Arc<[String]>,
}

impl TenantPolicy {
    /// Create a tenant entry.
    #[must_use]
    pub fn new(
        pattern: impl Into<String>,
        credential: Option<Credential>,
        allowed_paths: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            credential: credential.map(Arc::new),
            allowed_paths: allowed_paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from one `[[origins]]` entry, parsing its key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if the configured key cannot be parsed.
    pub fn from_section(section: &OriginSection) -> AuthResult<Self> {
        let credential = section
            .credential()
            .map(|source| Credential::from_source(&section.pattern, &source))
            .transpose()?;
        Ok(Self::new(
            section.pattern.clone(),
            credential,
            section.allowed_paths.iter().cloned(),
        ))
    }
}

/// Per-origin credentials and allowed paths, first matching pattern wins.
#[derive(Debug)]
pub struct MultiTenantResolver {
    matcher: OriginMatcher,
    tenants: Vec<TenantPolicy>,
}

impl MultiTenantResolver {
    /// Create a resolver from tenants in priority order.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidPattern`] if a pattern fails to compile.
    pub fn new(tenants: Vec<TenantPolicy>) -> AuthResult<Self> {
        let matcher = OriginMatcher::new(tenants.iter().map(|t| t.pattern.as_str()))?;
        Ok(Self { matcher, tenants })
    }

    /// Build from the `[[origins]]` sections.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern or key is invalid.
    pub fn from_sections(sections: &[OriginSection]) -> AuthResult<Self> {
        let tenants = sections
            .iter()
            .map(TenantPolicy::from_section)
            .collect::<AuthResult<Vec<_>>>()?;
        Self::new(tenants)
    }

    /// Tenants in priority order.
    #[must_use]
    pub fn tenants(&self) -> &[TenantPolicy] {
        &self.tenants
    }
}

impl CredentialResolver for MultiTenantResolver {
    fn matcher(&self) -> &OriginMatcher {
        &self.matcher
    }

    fn lookup(&self, index: usize) -> Option<Resolution> {
        let tenant = self.tenants.get(index)?;

        let Some(credential) = &tenant.credential else {
            error!(
                pattern = %tenant.pattern,
                "origin matched but has no credential configured"
            );
            return None;
        };

        if tenant.allowed_paths.is_empty() {
            warn!(
                pattern = %tenant.pattern,
                "origin has a credential but no allowed paths"
            );
        }

        Some(Resolution {
            pattern: tenant.pattern.clone(),
            credential: Arc::clone(credential),
            allowed_paths: Some(Arc::clone(&tenant.allowed_paths)),
        })
    }

    fn path_policy(&self) -> Option<PathPolicyEnforcer> {
        Some(PathPolicyEnforcer)
    }
}

/// Build the resolver a configuration selects.
///
/// # Errors
///
/// Returns [`scopegate_config::ConfigError::NoOriginPolicy`] (wrapped) when
/// no origin policy is configured, or an error for any bad pattern or key.
pub fn resolver_from_config(config: &Config) -> AuthResult<Arc<dyn CredentialResolver>> {
    match config.tenancy() {
        Some(Tenancy::Single(section)) => Ok(Arc::new(SingleTenantResolver::from_section(section)?)),
        Some(Tenancy::Multi(sections)) => Ok(Arc::new(MultiTenantResolver::from_sections(sections)?)),
        None => Err(scopegate_config::ConfigError::NoOriginPolicy.into()),
    }
}
