//! Verification credentials.
//!
//! Key material is parsed once, when the authorizer is built, so a bad key
//! fails startup instead of surfacing on the first connection.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::{Algorithm, DecodingKey};
use scopegate_config::CredentialSource;
use zeroize::Zeroizing;

use crate::error::{AuthError, AuthResult};

/// Algorithm family a credential can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    /// Shared secret: HS256, HS384, HS512.
    Hmac,
    /// RSA public key: RS256, RS384, RS512.
    Rsa,
}

impl KeyFamily {
    /// Algorithms accepted for this family.
    #[must_use]
    pub fn algorithms(self) -> &'static [Algorithm] {
        match self {
            Self::Hmac => &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512],
            Self::Rsa => &[Algorithm::RS256, Algorithm::RS384, Algorithm::RS512],
        }
    }

    /// Whether a token signed with `alg` may be verified by this family.
    #[must_use]
    pub fn admits(self, alg: Algorithm) -> bool {
        self.algorithms().contains(&alg)
    }
}

impl std::fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hmac => f.write_str("hmac"),
            Self::Rsa => f.write_str("rsa"),
        }
    }
}

/// A parsed verification key.
#[derive(Clone)]
pub struct Credential {
    key: DecodingKey,
    family: KeyFamily,
}

impl Credential {
    /// Shared secret from raw bytes.
    #[must_use]
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            family: KeyFamily::Hmac,
        }
    }

    /// Shared secret from its base64 encoding.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if the text is not base64 or decodes
    /// to nothing.
    pub fn from_base64_secret(origin: &str, encoded: &str) -> AuthResult<Self> {
        let bytes = Zeroizing::new(STANDARD.decode(encoded.trim()).map_err(|e| {
            AuthError::InvalidKey {
                origin: origin.to_owned(),
                reason: format!("secret is not valid base64: {e}"),
            }
        })?);
        if bytes.is_empty() {
            return Err(AuthError::InvalidKey {
                origin: origin.to_owned(),
                reason: "secret is empty".to_owned(),
            });
        }
        Ok(Self::from_secret(&bytes))
    }

    /// RSA public key in PEM form (`PUBLIC KEY` or `RSA PUBLIC KEY`).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if the PEM cannot be parsed.
    pub fn from_rsa_pem(origin: &str, pem: &str) -> AuthResult<Self> {
        let key = DecodingKey::from_rsa_pem(pem.trim().as_bytes()).map_err(|e| {
            AuthError::InvalidKey {
                origin: origin.to_owned(),
                reason: format!("not a usable RSA public key: {e}"),
            }
        })?;
        Ok(Self {
            key,
            family: KeyFamily::Rsa,
        })
    }

    /// Parse configured key material.
    ///
    /// # Errors
    ///
    /// See [`Credential::from_base64_secret`] and [`Credential::from_rsa_pem`].
    pub fn from_source(origin: &str, source: &CredentialSource<'_>) -> AuthResult<Self> {
        match source {
            CredentialSource::Secret(secret) => Self::from_base64_secret(origin, secret),
            CredentialSource::PublicKey(pem) => Self::from_rsa_pem(origin, pem),
        }
    }

    /// The algorithm family this credential verifies.
    #[must_use]
    pub fn family(&self) -> KeyFamily {
        self.family
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}
