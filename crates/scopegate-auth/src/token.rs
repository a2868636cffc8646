//! Identity token verification.
//!
//! Tokens are JWTs. The audience must be the application's own `host:port`
//! and the issuer must be the exact origin the connection came from, so a
//! token minted for one origin cannot be replayed through another even if
//! both match the same pattern.

use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::credential::Credential;
use crate::error::{AuthError, AuthResult};

/// JWT `aud`: a single value or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// One audience.
    One(String),
    /// Several audiences.
    Many(Vec<String>),
}

/// Verified token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Issuer: the origin that minted the token.
    pub iss: String,
    /// Audience: the application's `host:port`.
    pub aud: Audience,
    /// Issued-at, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Expiry, seconds since the epoch.
    pub exp: u64,
    /// Not-before, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
    /// Subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Root-relative paths the session may observe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_paths: Option<Vec<String>>,
}

/// Why a token was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRejection {
    /// Not a decodable JWT.
    Malformed(String),
    /// Signed with an algorithm outside the credential's family.
    AlgorithmMismatch(Algorithm),
    /// Signature does not verify.
    BadSignature,
    /// Past `exp`.
    Expired,
    /// Before `nbf`.
    NotYetValid,
    /// `aud` is not this application.
    WrongAudience,
    /// `iss` is not the connecting origin.
    WrongIssuer,
    /// A registered claim required for validation is absent.
    MissingClaim(String),
    /// Valid token without path grants.
    MissingAuthorizedPaths,
}

impl std::fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(reason) => write!(f, "malformed token: {reason}"),
            Self::AlgorithmMismatch(alg) => write!(f, "algorithm {alg:?} not allowed for this key"),
            Self::BadSignature => f.write_str("invalid signature"),
            Self::Expired => f.write_str("token expired"),
            Self::NotYetValid => f.write_str("token not yet valid"),
            Self::WrongAudience => f.write_str("audience mismatch"),
            Self::WrongIssuer => f.write_str("issuer mismatch"),
            Self::MissingClaim(claim) => write!(f, "missing required claim '{claim}'"),
            Self::MissingAuthorizedPaths => f.write_str("token carries no authorized_paths"),
        }
    }
}

/// Outcome of verifying one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// All checks passed; `authorized_paths` is present and non-empty.
    Verified(IdentityClaims),
    /// The token does not qualify.
    Rejected(TokenRejection),
}

/// Verifies identity tokens for one application audience.
#[derive(Debug, Clone)]
pub struct TokenAuthorizer {
    audience: String,
    leeway: u64,
}

impl TokenAuthorizer {
    /// Create a verifier expecting `audience` (`host:port`).
    ///
    /// Expiry and not-before are checked without clock leeway.
    #[must_use]
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            leeway: 0,
        }
    }

    /// Allow `seconds` of clock skew on `exp`/`nbf`.
    #[must_use]
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway = seconds;
        self
    }

    /// The expected audience.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Verify `token` against `credential`, requiring `iss == expected_issuer`.
    ///
    /// Rejections are logged together with the raw token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Verification`] when verification fails for a
    /// reason that is not the token's fault, such as unusable key material.
    pub fn verify(
        &self,
        token: &str,
        expected_issuer: &str,
        credential: &Credential,
    ) -> AuthResult<Verification> {
        let outcome = self.check(token, expected_issuer, credential)?;
        match &outcome {
            Verification::Verified(claims) => {
                debug!(
                    iss = %claims.iss,
                    sub = claims.sub.as_deref().unwrap_or("<none>"),
                    authorized_paths = ?claims.authorized_paths,
                    "token verified"
                );
            },
            Verification::Rejected(TokenRejection::MissingAuthorizedPaths) => {
                warn!(
                    token = %token,
                    "token verified but carries no authorized_paths claim"
                );
            },
            Verification::Rejected(reason) => {
                warn!(
                    token = %token,
                    issuer = %expected_issuer,
                    audience = %self.audience,
                    reason = %reason,
                    "token rejected"
                );
            },
        }
        Ok(outcome)
    }

    fn check(
        &self,
        token: &str,
        expected_issuer: &str,
        credential: &Credential,
    ) -> AuthResult<Verification> {
        let header = match decode_header(token) {
            Ok(header) => header,
            Err(e) => return classify(e).map(Verification::Rejected),
        };

        if !credential.family().admits(header.alg) {
            return Ok(Verification::Rejected(TokenRejection::AlgorithmMismatch(
                header.alg,
            )));
        }

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.leeway;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[expected_issuer]);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);

        let claims = match decode::<IdentityClaims>(token, credential.decoding_key(), &validation) {
            Ok(data) => data.claims,
            Err(e) => return classify(e).map(Verification::Rejected),
        };

        match &claims.authorized_paths {
            Some(paths) if !paths.is_empty() => Ok(Verification::Verified(claims)),
            _ => Ok(Verification::Rejected(
                TokenRejection::MissingAuthorizedPaths,
            )),
        }
    }
}

/// Split library errors into token rejections and real failures.
fn classify(err: JwtError) -> AuthResult<TokenRejection> {
    let rejection = match err.kind() {
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::InvalidAlgorithmName => TokenRejection::Malformed(err.to_string()),
        ErrorKind::InvalidSignature => TokenRejection::BadSignature,
        ErrorKind::ExpiredSignature => TokenRejection::Expired,
        ErrorKind::ImmatureSignature => TokenRejection::NotYetValid,
        ErrorKind::InvalidAudience => TokenRejection::WrongAudience,
        ErrorKind::InvalidIssuer => TokenRejection::WrongIssuer,
        ErrorKind::InvalidSubject => TokenRejection::Malformed(err.to_string()),
        ErrorKind::MissingRequiredClaim(claim) => TokenRejection::MissingClaim(claim.clone()),
        ErrorKind::InvalidAlgorithm => TokenRejection::Malformed(err.to_string()),
        _ => return Err(AuthError::Verification(err.to_string())),
    };
    Ok(rejection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopegate_test::{TokenFactory, keys};

    const AUD: &str = "files.example:443";
    const ISS: &str = "https://a.example";

    fn hmac() -> (TokenFactory, Credential) {
        (
            TokenFactory::hmac(b"shared-secret"),
            Credential::from_secret(b"shared-secret"),
        )
    }

    fn verify(token: &str, credential: &Credential) -> Verification {
        TokenAuthorizer::new(AUD)
            .verify(token, ISS, credential)
            .unwrap()
    }

    #[test]
    fn test_valid_hmac_token() {
        let (factory, cred) = hmac();
        let token = factory.claims(ISS, AUD).paths(["client-a"]).sub("u1").mint();
        match verify(&token, &cred) {
            Verification::Verified(claims) => {
                assert_eq!(claims.iss, ISS);
                assert_eq!(claims.sub.as_deref(), Some("u1"));
                assert_eq!(claims.authorized_paths.unwrap(), vec!["client-a"]);
            },
            other => panic!("expected verified, got {other:?}"),
        }
    }

    #[test]
    fn test_hmac_variants() {
        for alg in [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512] {
            let (factory, cred) = hmac();
            let token = factory
                .with_algorithm(alg)
                .claims(ISS, AUD)
                .paths(["a"])
                .mint();
            assert!(matches!(verify(&token, &cred), Verification::Verified(_)));
        }
    }

    #[test]
    fn test_valid_rsa_token() {
        let factory = TokenFactory::rsa(keys::RSA_PRIVATE_KEY_PEM);
        let cred = Credential::from_rsa_pem(ISS, keys::RSA_PUBLIC_KEY_PEM).unwrap();
        let token = factory.claims(ISS, AUD).paths(["client-a"]).mint();
        assert!(matches!(verify(&token, &cred), Verification::Verified(_)));
    }

    #[test]
    fn test_rsa_token_from_other_key() {
        let factory = TokenFactory::rsa(keys::OTHER_RSA_PRIVATE_KEY_PEM);
        let cred = Credential::from_rsa_pem(ISS, keys::RSA_PUBLIC_KEY_PEM).unwrap();
        let token = factory.claims(ISS, AUD).paths(["client-a"]).mint();
        assert_eq!(
            verify(&token, &cred),
            Verification::Rejected(TokenRejection::BadSignature)
        );
    }

    #[test]
    fn test_algorithm_family_mismatch() {
        let factory = TokenFactory::rsa(keys::RSA_PRIVATE_KEY_PEM);
        let (_, hmac_cred) = hmac();
        let token = factory.claims(ISS, AUD).paths(["a"]).mint();
        assert_eq!(
            verify(&token, &hmac_cred),
            Verification::Rejected(TokenRejection::AlgorithmMismatch(Algorithm::RS256))
        );

        let (factory, _) = hmac();
        let rsa_cred = Credential::from_rsa_pem(ISS, keys::RSA_PUBLIC_KEY_PEM).unwrap();
        let token = factory.claims(ISS, AUD).paths(["a"]).mint();
        assert_eq!(
            verify(&token, &rsa_cred),
            Verification::Rejected(TokenRejection::AlgorithmMismatch(Algorithm::HS256))
        );
    }

    #[test]
    fn test_wrong_secret() {
        let factory = TokenFactory::hmac(b"other-secret");
        let (_, cred) = hmac();
        let token = factory.claims(ISS, AUD).paths(["a"]).mint();
        assert_eq!(
            verify(&token, &cred),
            Verification::Rejected(TokenRejection::BadSignature)
        );
    }

    #[test]
    fn test_expired() {
        let (factory, cred) = hmac();
        let token = factory.claims(ISS, AUD).paths(["a"]).expires_in(-120).mint();
        assert_eq!(
            verify(&token, &cred),
            Verification::Rejected(TokenRejection::Expired)
        );
    }

    #[test]
    fn test_not_yet_valid() {
        let (factory, cred) = hmac();
        let token = factory.claims(ISS, AUD).paths(["a"]).not_before_in(600).mint();
        assert_eq!(
            verify(&token, &cred),
            Verification::Rejected(TokenRejection::NotYetValid)
        );
    }

    #[test]
    fn test_wrong_audience() {
        let (factory, cred) = hmac();
        let token = factory
            .claims(ISS, "files.example:8443")
            .paths(["a"])
            .mint();
        assert_eq!(
            verify(&token, &cred),
            Verification::Rejected(TokenRejection::WrongAudience)
        );
    }

    #[test]
    fn test_issuer_must_be_exact_origin() {
        let (factory, cred) = hmac();
        let token = factory
            .claims("https://b.example", AUD)
            .paths(["a"])
            .mint();
        assert_eq!(
            verify(&token, &cred),
            Verification::Rejected(TokenRejection::WrongIssuer)
        );
    }

    #[test]
    fn test_missing_authorized_paths() {
        let (factory, cred) = hmac();
        let token = factory.claims(ISS, AUD).mint();
        assert_eq!(
            verify(&token, &cred),
            Verification::Rejected(TokenRejection::MissingAuthorizedPaths)
        );

        let token = factory.claims(ISS, AUD).paths(Vec::<String>::new()).mint();
        assert_eq!(
            verify(&token, &cred),
            Verification::Rejected(TokenRejection::MissingAuthorizedPaths)
        );
    }

    #[test]
    fn test_malformed() {
        let (_, cred) = hmac();
        for token in ["", "not-a-jwt", "a.b.c"] {
            assert!(
                matches!(
                    verify(token, &cred),
                    Verification::Rejected(TokenRejection::Malformed(_))
                ),
                "accepted {token:?}"
            );
        }
    }

    #[test]
    fn test_claims_round_trip_optional_fields() {
        let json = r#"{"iss":"i","aud":["x","y"],"exp":1}"#;
        let claims: IdentityClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.aud, Audience::Many(vec!["x".into(), "y".into()]));
        assert!(claims.authorized_paths.is_none());
        assert!(claims.iat.is_none());
    }
}
