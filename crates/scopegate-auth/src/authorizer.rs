//! Connection admission.
//!
//! The [`Authorizer`] runs the full decision for one incoming connection:
//! origin gate, credential lookup, token verification, path policy, and
//! finally the scoped filesystem handed to the session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use scopegate_config::{Config, is_valid_app_host};
use scopegate_telemetry::ConnectionContext;
use scopegate_vfs::{HostVfs, ScopedVfs, Vfs, VfsResult};
use tracing::{Instrument, Span, info, warn};
use url::Url;

use crate::error::{AuthError, AuthResult};
use crate::grant::SessionGrant;
use crate::policy::PathPolicyEnforcer;
use crate::resolver::{CredentialResolver, resolver_from_config};
use crate::token::{TokenAuthorizer, TokenRejection, Verification};

/// Query parameter carrying the identity token.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Base used to parse request targets that are only a path and query.
const REQUEST_BASE_URL: &str = "http://localhost/";

/// What the transport knows about an incoming connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    /// The `Origin` header, if sent.
    pub origin: Option<String>,
    /// The raw request target, e.g. `/sftp?token=...`.
    pub raw_url: String,
}

impl ConnectionRequest {
    /// Create a request.
    #[must_use]
    pub fn new(origin: Option<&str>, raw_url: impl Into<String>) -> Self {
        Self {
            origin: origin.map(ToOwned::to_owned),
            raw_url: raw_url.into(),
        }
    }

    /// The `token` query parameter, if present and non-empty.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        let base = Url::parse(REQUEST_BASE_URL).ok()?;
        let url = base.join(&self.raw_url).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == TOKEN_QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|token| !token.is_empty())
    }
}

/// Why a connection was refused. The client sees the same refusal for all
/// of these; the distinction is for server logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    /// No configured pattern matches the origin (or it was missing).
    OriginNotAllowed,
    /// The origin matched but no usable credential is configured for it.
    CredentialUnavailable,
    /// The request carried no token.
    MissingToken,
    /// The token failed verification.
    Token(TokenRejection),
    /// The token requested paths outside the origin's allowed set.
    PathPolicy {
        /// Paths the token asked for.
        requested: Vec<String>,
        /// Paths the origin may grant.
        allowed: Vec<String>,
    },
    /// A granted path is not a plain relative path.
    InvalidGrant(String),
}

impl std::fmt::Display for Refusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OriginNotAllowed => f.write_str("origin not allowed"),
            Self::CredentialUnavailable => f.write_str("no credential for origin"),
            Self::MissingToken => f.write_str("no token in request"),
            Self::Token(reason) => write!(f, "token rejected: {reason}"),
            Self::PathPolicy { .. } => f.write_str("requested paths not allowed for origin"),
            Self::InvalidGrant(path) => write!(f, "invalid grant entry '{path}'"),
        }
    }
}

/// What an accepted session starts with.
pub struct SessionInit {
    /// The filesystem the session must use.
    pub filesystem: ScopedVfs,
    /// The grant the filesystem was built from.
    pub grant: SessionGrant,
}

impl std::fmt::Debug for SessionInit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInit")
            .field("grant", &self.grant)
            .finish_non_exhaustive()
    }
}

/// Result of the admission hook.
#[derive(Debug)]
pub enum Admission {
    /// No session is created.
    Refused(Refusal),
    /// A session may start with this state.
    Accepted(SessionInit),
}

impl Admission {
    /// Whether the connection was accepted.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// The refusal reason, if refused.
    #[must_use]
    pub fn refusal(&self) -> Option<&Refusal> {
        match self {
            Self::Refused(reason) => Some(reason),
            Self::Accepted(_) => None,
        }
    }
}

/// Creates the unscoped filesystem for a session.
pub trait FilesystemProvider: Send + Sync {
    /// Filesystem rooted at `grant.root()`.
    ///
    /// # Errors
    ///
    /// Returns a VFS error if the filesystem cannot be created.
    fn filesystem(&self, grant: &SessionGrant) -> VfsResult<Box<dyn Vfs>>;
}

/// Serves sessions from the host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFilesystemProvider;

impl FilesystemProvider for HostFilesystemProvider {
    fn filesystem(&self, grant: &SessionGrant) -> VfsResult<Box<dyn Vfs>> {
        Ok(Box::new(HostVfs::new(grant.root())?))
    }
}

/// The connection-admission hook.
///
/// Read-only after construction and cheap to clone; share one across all
/// connections.
#[derive(Clone)]
pub struct Authorizer {
    resolver: Arc<dyn CredentialResolver>,
    policy: Option<PathPolicyEnforcer>,
    tokens: TokenAuthorizer,
    root: PathBuf,
    provider: Arc<dyn FilesystemProvider>,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("origins", &self.resolver.matcher().len())
            .field("path_policy", &self.policy.is_some())
            .field("audience", &self.tokens.audience())
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Authorizer {
    /// Create an authorizer.
    ///
    /// The path policy is the one the resolver's strategy calls for.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidAppHost`] if `app_host` is not `host:port`.
    pub fn new(
        resolver: Arc<dyn CredentialResolver>,
        app_host: &str,
        root: impl Into<PathBuf>,
    ) -> AuthResult<Self> {
        if !is_valid_app_host(app_host) {
            return Err(AuthError::InvalidAppHost(app_host.to_owned()));
        }
        let policy = resolver.path_policy();
        Ok(Self {
            resolver,
            policy,
            tokens: TokenAuthorizer::new(app_host),
            root: root.into(),
            provider: Arc::new(HostFilesystemProvider),
        })
    }

    /// Build from a validated configuration, parsing every key up front.
    ///
    /// # Errors
    ///
    /// Returns an error if no origin policy is configured or any pattern,
    /// key or the application host is invalid.
    pub fn from_config(config: &Config) -> AuthResult<Self> {
        let resolver = resolver_from_config(config)?;
        Self::new(
            resolver,
            &config.server.app_host,
            config.server.virtual_root.clone(),
        )
    }

    /// Use a different filesystem provider.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn FilesystemProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Allow clock skew when checking token times.
    #[must_use]
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.tokens = self.tokens.with_leeway(seconds);
        self
    }

    /// The token audience.
    #[must_use]
    pub fn audience(&self) -> &str {
        self.tokens.audience()
    }

    /// The directory sessions are rooted at.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The credential resolution strategy.
    #[must_use]
    pub fn resolver(&self) -> &dyn CredentialResolver {
        self.resolver.as_ref()
    }

    /// Decide on a connection without building its filesystem.
    ///
    /// This is synchronous and may block on signature verification; async
    /// callers should use [`Authorizer::admit`].
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that are not the client's fault.
    pub fn authorize(
        &self,
        request: &ConnectionRequest,
    ) -> AuthResult<Result<SessionGrant, Refusal>> {
        let origin = request.origin.as_deref();

        let Some(index) = self.resolver.matcher().find(origin) else {
            warn!(origin = origin.unwrap_or("<none>"), "origin not allowed");
            return Ok(Err(Refusal::OriginNotAllowed));
        };
        // `find` only matches non-empty origins.
        let origin = origin.unwrap_or_default();

        let Some(resolution) = self.resolver.lookup(index) else {
            warn!(origin, "no credential available for origin");
            return Ok(Err(Refusal::CredentialUnavailable));
        };

        let Some(token) = request.token() else {
            warn!(origin, "connection has no token");
            return Ok(Err(Refusal::MissingToken));
        };

        let claims = match self.tokens.verify(&token, origin, &resolution.credential)? {
            Verification::Verified(claims) => claims,
            Verification::Rejected(reason) => return Ok(Err(Refusal::Token(reason))),
        };
        let requested = claims.authorized_paths.clone().unwrap_or_default();

        if let Some(policy) = &self.policy {
            if !policy.authorize(&requested, resolution.allowed_paths.as_deref()) {
                return Ok(Err(Refusal::PathPolicy {
                    requested,
                    allowed: resolution
                        .allowed_paths
                        .as_deref()
                        .map(<[String]>::to_vec)
                        .unwrap_or_default(),
                }));
            }
        }

        let grant = match SessionGrant::new(self.root.clone(), &requested) {
            Ok(grant) => grant.with_subject(claims.sub),
            Err(e) => {
                warn!(origin, error = %e, "rejecting token with invalid grant");
                return Ok(Err(Refusal::InvalidGrant(e.0)));
            },
        };

        info!(
            origin,
            pattern = %resolution.pattern,
            sub = grant.subject().unwrap_or("<none>"),
            authorized_paths = ?grant.authorized_paths(),
            "connection authorized"
        );
        Ok(Ok(grant))
    }

    /// The admission hook: authorize `request` and, if accepted, build the
    /// session's scoped filesystem.
    ///
    /// Runs inside a per-connection span; verification happens on the
    /// blocking pool.
    ///
    /// # Errors
    ///
    /// Returns an error for failures that are not the client's fault:
    /// unexpected verification errors, a failed blocking task, or a
    /// filesystem that cannot be created.
    pub async fn admit(&self, request: ConnectionRequest) -> AuthResult<Admission> {
        let context = ConnectionContext::new(request.origin.as_deref());
        let span = context.span();

        async move {
            let this = self.clone();
            let current = Span::current();
            let decision = tokio::task::spawn_blocking(move || {
                current.in_scope(|| this.authorize(&request))
            })
            .await
            .map_err(|e| AuthError::TaskFailed(e.to_string()))??;

            let grant = match decision {
                Ok(grant) => grant,
                Err(refusal) => {
                    info!(
                        reason = %refusal,
                        elapsed_ms = context.elapsed_ms(),
                        "connection refused"
                    );
                    return Ok(Admission::Refused(refusal));
                },
            };

            let inner = self.provider.filesystem(&grant)?;
            let filesystem = ScopedVfs::new(inner, grant.authorized_paths());
            info!(elapsed_ms = context.elapsed_ms(), "session admitted");
            Ok(Admission::Accepted(SessionInit { filesystem, grant }))
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Credential;
    use crate::origin::OriginMatcher;
    use crate::resolver::{MultiTenantResolver, Resolution, SingleTenantResolver, TenantPolicy};
    use scopegate_test::TokenFactory;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const AUD: &str = "files.example:443";
    const A: &str = "https://a.example";
    const SECRET: &[u8] = b"secret-a";

    fn multi() -> Arc<dyn CredentialResolver> {
        Arc::new(
            MultiTenantResolver::new(vec![
                TenantPolicy::new(
                    "https://a\\.example",
                    Some(Credential::from_secret(SECRET)),
                    ["client-a", "shared"],
                ),
                TenantPolicy::new(
                    "https://b\\.example",
                    Some(Credential::from_secret(b"secret-b")),
                    ["client-b"],
                ),
                TenantPolicy::new(
                    "https://empty\\.example",
                    Some(Credential::from_secret(b"secret-e")),
                    Vec::<String>::new(),
                ),
                TenantPolicy::new("https://nokey\\.example", None, ["x"]),
            ])
            .unwrap(),
        )
    }

    fn authorizer() -> Authorizer {
        Authorizer::new(multi(), AUD, "/srv/files").unwrap()
    }

    fn url_for(token: &str) -> String {
        format!("/sftp?token={token}")
    }

    fn decide(auth: &Authorizer, origin: Option<&str>, url: &str) -> Result<SessionGrant, Refusal> {
        auth.authorize(&ConnectionRequest::new(origin, url)).unwrap()
    }

    /// Counts lookups so tests can assert none happened.
    struct CountingResolver {
        inner: Arc<dyn CredentialResolver>,
        lookups: AtomicUsize,
    }

    impl CredentialResolver for CountingResolver {
        fn matcher(&self) -> &OriginMatcher {
            self.inner.matcher()
        }

        fn lookup(&self, index: usize) -> Option<Resolution> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup(index)
        }

        fn path_policy(&self) -> Option<PathPolicyEnforcer> {
            self.inner.path_policy()
        }
    }

    #[test]
    fn test_token_extraction() {
        let r = ConnectionRequest::new(None, "/sftp?foo=1&token=abc.def.ghi");
        assert_eq!(r.token().as_deref(), Some("abc.def.ghi"));

        let r = ConnectionRequest::new(None, "/?token=a%2Bb");
        assert_eq!(r.token().as_deref(), Some("a+b"));

        assert!(ConnectionRequest::new(None, "/sftp").token().is_none());
        assert!(ConnectionRequest::new(None, "/sftp?token=").token().is_none());
    }

    #[test]
    fn test_invalid_app_host() {
        assert!(matches!(
            Authorizer::new(multi(), "https://files.example", "/srv/files"),
            Err(AuthError::InvalidAppHost(_))
        ));
    }

    #[test]
    fn test_unmatched_origin_skips_lookup() {
        let counting = Arc::new(CountingResolver {
            inner: multi(),
            lookups: AtomicUsize::new(0),
        });
        let auth = Authorizer::new(counting.clone(), AUD, "/srv/files").unwrap();

        assert_eq!(
            decide(&auth, Some("https://evil.example"), "/?token=garbage"),
            Err(Refusal::OriginNotAllowed)
        );
        assert_eq!(decide(&auth, None, "/?token=garbage"), Err(Refusal::OriginNotAllowed));
        assert_eq!(counting.lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subset_grant_accepted() {
        let token = TokenFactory::hmac(SECRET)
            .claims(A, AUD)
            .paths(["client-a"])
            .mint();
        let grant = decide(&authorizer(), Some(A), &url_for(&token)).unwrap();
        assert_eq!(grant.authorized_paths(), ["client-a"]);
        assert_eq!(grant.root(), Path::new("/srv/files"));
    }

    #[test]
    fn test_partial_grant_rejected() {
        let token = TokenFactory::hmac(SECRET)
            .claims(A, AUD)
            .paths(["client-a", "client-z"])
            .mint();
        assert!(matches!(
            decide(&authorizer(), Some(A), &url_for(&token)),
            Err(Refusal::PathPolicy { .. })
        ));
    }

    #[test]
    fn test_issuer_bound_to_connecting_origin() {
        // Valid for b.example, replayed through a.example with a's secret.
        let token = TokenFactory::hmac(SECRET)
            .claims("https://b.example", AUD)
            .paths(["client-a"])
            .mint();
        assert_eq!(
            decide(&authorizer(), Some(A), &url_for(&token)),
            Err(Refusal::Token(TokenRejection::WrongIssuer))
        );
    }

    #[test]
    fn test_empty_allowed_paths_reject_everything() {
        let origin = "https://empty.example";
        let token = TokenFactory::hmac(b"secret-e")
            .claims(origin, AUD)
            .paths(["anything"])
            .mint();
        assert!(matches!(
            decide(&authorizer(), Some(origin), &url_for(&token)),
            Err(Refusal::PathPolicy { .. })
        ));
    }

    #[test]
    fn test_missing_credential() {
        assert_eq!(
            decide(&authorizer(), Some("https://nokey.example"), "/?token=x"),
            Err(Refusal::CredentialUnavailable)
        );
    }

    #[test]
    fn test_leeway_tolerates_clock_skew() {
        let token = TokenFactory::hmac(SECRET)
            .claims(A, AUD)
            .paths(["client-a"])
            .expires_in(-30)
            .mint();
        assert_eq!(
            decide(&authorizer(), Some(A), &url_for(&token)),
            Err(Refusal::Token(TokenRejection::Expired))
        );
        assert!(decide(&authorizer().with_leeway(120), Some(A), &url_for(&token)).is_ok());
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(
            decide(&authorizer(), Some(A), "/sftp"),
            Err(Refusal::MissingToken)
        );
    }

    #[test]
    fn test_single_tenant_has_no_path_ceiling() {
        let resolver = Arc::new(
            SingleTenantResolver::new(["https://a\\.example"], Credential::from_secret(SECRET))
                .unwrap(),
        );
        let auth = Authorizer::new(resolver, AUD, "/srv/files").unwrap();
        let token = TokenFactory::hmac(SECRET)
            .claims(A, AUD)
            .paths(["anything", "else"])
            .mint();
        let grant = decide(&auth, Some(A), &url_for(&token)).unwrap();
        assert_eq!(grant.authorized_paths(), ["anything", "else"]);

        let token = TokenFactory::hmac(SECRET)
            .claims(A, AUD)
            .paths(["../etc"])
            .mint();
        assert_eq!(
            decide(&auth, Some(A), &url_for(&token)),
            Err(Refusal::InvalidGrant("../etc".into()))
        );
    }

    #[tokio::test]
    async fn test_admit_builds_scoped_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("client-a")).await.unwrap();
        tokio::fs::create_dir(dir.path().join("client-b")).await.unwrap();

        let auth = Authorizer::new(multi(), AUD, dir.path()).unwrap();
        let token = TokenFactory::hmac(SECRET)
            .claims(A, AUD)
            .paths(["client-a"])
            .mint();

        let admission = auth
            .admit(ConnectionRequest::new(Some(A), url_for(&token)))
            .await
            .unwrap();
        let Admission::Accepted(init) = admission else {
            panic!("expected acceptance, got {admission:?}");
        };

        let root = init.filesystem.resolve_path("/").unwrap();
        let listing = init.filesystem.read_dir(&root).await.unwrap();
        assert_eq!(listing.names(), vec![".", "..", "client-a"]);
    }

    #[tokio::test]
    async fn test_admit_refuses() {
        let admission = authorizer()
            .admit(ConnectionRequest::new(Some("https://evil.example"), "/"))
            .await
            .unwrap();
        assert_eq!(admission.refusal(), Some(&Refusal::OriginNotAllowed));
        assert!(!admission.is_accepted());
    }
}
