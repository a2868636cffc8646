//! Authorization error types.
//!
//! These are the conditions that must not be swallowed: bad key material,
//! invalid construction parameters, and verification failures the token
//! library could not attribute to the token itself. A token or origin that
//! simply fails to qualify is a [`Refusal`](crate::Refusal), not an error.

use thiserror::Error;

/// Errors that stop an admission (or startup) outright.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Configured key material could not be parsed.
    #[error("invalid key for origin {origin}: {reason}")]
    InvalidKey {
        /// The origin pattern the key belongs to.
        origin: String,
        /// Why the key was rejected.
        reason: String,
    },

    /// An origin pattern failed to compile.
    #[error("invalid origin pattern: {pattern} - {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// The application's external address is not `host:port`.
    #[error("invalid application host '{0}': expected host:port without a scheme")]
    InvalidAppHost(String),

    /// Token verification failed for a reason unrelated to the token.
    #[error("unexpected token verification failure: {0}")]
    Verification(String),

    /// The blocking verification task did not complete.
    #[error("authorization task failed: {0}")]
    TaskFailed(String),

    /// The session filesystem could not be created.
    #[error("filesystem error: {0}")]
    Filesystem(#[from] scopegate_vfs::VfsError),

    /// Configuration could not be turned into an authorizer.
    #[error("configuration error: {0}")]
    Config(#[from] scopegate_config::ConfigError),
}

/// Result type for authorization operations.
pub type AuthResult<T> = Result<T, AuthError>;
