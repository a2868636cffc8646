//! Identity token minting for tests.
//!
//! The service only verifies tokens; these helpers stand in for the issuing
//! application.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;
use serde_json::{Map, Value};

/// Default token lifetime in seconds.
pub const DEFAULT_TTL_SECS: i64 = 300;

/// Base64 form of a raw secret, as it appears in configuration.
#[must_use]
pub fn base64_secret(secret: &[u8]) -> String {
    STANDARD.encode(secret)
}

/// Signs test tokens with one key.
#[derive(Clone)]
pub struct TokenFactory {
    key: EncodingKey,
    algorithm: Algorithm,
}

impl TokenFactory {
    /// HS256 tokens signed with `secret`.
    #[must_use]
    pub fn hmac(secret: &[u8]) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
        }
    }

    /// RS256 tokens signed with a PEM private key.
    ///
    /// # Panics
    ///
    /// Panics if the PEM is not an RSA private key.
    #[must_use]
    pub fn rsa(private_key_pem: &str) -> Self {
        Self {
            key: EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
                .expect("Failed to parse RSA private key"),
            algorithm: Algorithm::RS256,
        }
    }

    /// Sign with a different algorithm of the same family.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Start a claim set with issuer and audience, valid for
    /// [`DEFAULT_TTL_SECS`].
    #[must_use]
    pub fn claims(&self, iss: &str, aud: &str) -> TokenBuilder<'_> {
        let now = Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("iss".into(), Value::from(iss));
        claims.insert("aud".into(), Value::from(aud));
        claims.insert("iat".into(), Value::from(now));
        claims.insert("exp".into(), Value::from(now.saturating_add(DEFAULT_TTL_SECS)));
        TokenBuilder {
            factory: self,
            claims,
            now,
        }
    }

    /// Sign arbitrary claims.
    ///
    /// # Panics
    ///
    /// Panics if signing fails.
    #[must_use]
    pub fn sign<T: Serialize>(&self, claims: &T) -> String {
        encode(&Header::new(self.algorithm), claims, &self.key).expect("Failed to sign token")
    }
}

/// A claim set under construction.
pub struct TokenBuilder<'a> {
    factory: &'a TokenFactory,
    claims: Map<String, Value>,
    now: i64,
}

impl TokenBuilder<'_> {
    /// Set `authorized_paths`.
    #[must_use]
    pub fn paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<Value> = paths.into_iter().map(|p| Value::String(p.into())).collect();
        self.claims
            .insert("authorized_paths".into(), Value::Array(paths));
        self
    }

    /// Set `sub`.
    #[must_use]
    pub fn sub(self, sub: &str) -> Self {
        self.claim("sub", sub)
    }

    /// Expire `secs` from now (negative for already expired).
    #[must_use]
    pub fn expires_in(self, secs: i64) -> Self {
        let exp = self.now.saturating_add(secs);
        self.claim("exp", exp)
    }

    /// Not valid until `secs` from now.
    #[must_use]
    pub fn not_before_in(self, secs: i64) -> Self {
        let nbf = self.now.saturating_add(secs);
        self.claim("nbf", nbf)
    }

    /// Set any claim.
    #[must_use]
    pub fn claim(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.claims.insert(name.to_owned(), value.into());
        self
    }

    /// Remove a claim.
    #[must_use]
    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Sign the claim set.
    #[must_use]
    pub fn mint(self) -> String {
        self.factory.sign(&self.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    #[test]
    fn test_minted_token_decodes() {
        let token = TokenFactory::hmac(b"s")
            .claims("https://a.example", "h:1")
            .paths(["a"])
            .mint();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["h:1"]);
        let data = decode::<Map<String, Value>>(&token, &DecodingKey::from_secret(b"s"), &validation)
            .unwrap();
        assert_eq!(data.claims["iss"], "https://a.example");
        assert_eq!(data.claims["authorized_paths"][0], "a");
    }

    #[test]
    fn test_without_removes_claim() {
        let factory = TokenFactory::hmac(b"s");
        let builder = factory.claims("i", "a").without("exp");
        assert!(!builder.claims.contains_key("exp"));
    }

    #[test]
    fn test_base64_secret() {
        assert_eq!(base64_secret(b"secret"), "c2VjcmV0");
    }
}
