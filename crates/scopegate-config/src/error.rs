//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path of the file.
        path: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// A config file is not valid TOML or does not match the schema.
    #[error("failed to parse config {path}: {source}")]
    ParseError {
        /// Path of the file (or a `<...>` marker for non-file sources).
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// An environment variable holds a malformed value.
    #[error("invalid value in environment variable {var}: {message}")]
    EnvError {
        /// Name of the variable.
        var: String,
        /// What was wrong with it.
        message: String,
    },

    /// A field failed validation.
    #[error("invalid config field {field}: {message}")]
    ValidationError {
        /// Dotted path of the field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// Neither `[single_tenant]` nor `[[origins]]` is configured.
    #[error(
        "no origin policy configured; set [[origins]] / SFTP_WS_ORIGIN_RESTRICTIONS \
         or [single_tenant] / JWT_HMAC_SECRET"
    )]
    NoOriginPolicy,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
