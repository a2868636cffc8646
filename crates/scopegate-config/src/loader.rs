//! Config file discovery and loading.
//!
//! Implements [`load`]:
//! 1. Pick the file: explicit path, else `SCOPEGATE_CONFIG`, else the system
//!    path if it exists
//! 2. Parse it into [`Config`] (an absent file yields the defaults)
//! 3. Apply environment fallbacks for unset fields
//! 4. Validate
//! 5. Return a [`ResolvedConfig`]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{ENV_CONFIG, apply_env_fallbacks};
use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// System-wide config location, used when nothing else is named.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/scopegate/config.toml";

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// A validated configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The validated configuration.
    pub config: Config,
    /// The file that was read, if any.
    pub source: Option<PathBuf>,
    /// How many fields were filled from environment variables.
    pub env_fallbacks: usize,
}

/// Load and validate configuration.
///
/// An explicitly named file (argument or `SCOPEGATE_CONFIG`) must exist;
/// the system path is optional.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a file is unreadable or malformed, an
/// environment variable is malformed, or the result fails validation.
pub fn load(
    explicit_path: Option<&Path>,
    env: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    let named = explicit_path
        .map(Path::to_path_buf)
        .or_else(|| env.get(ENV_CONFIG).filter(|v| !v.is_empty()).map(PathBuf::from));

    let (mut config, source) = match named {
        Some(path) => (load_file(&path)?, Some(path)),
        None => {
            let system = PathBuf::from(SYSTEM_CONFIG_PATH);
            match try_load_file(&system)? {
                Some(config) => (config, Some(system)),
                None => (Config::default(), None),
            }
        },
    };

    let env_fallbacks = apply_env_fallbacks(&mut config, env)?;
    if env_fallbacks > 0 {
        debug!(count = env_fallbacks, "applied environment variable fallbacks");
    }

    validate::validate(&config)?;

    info!(
        source = source
            .as_deref()
            .map_or_else(|| "<environment>".to_owned(), |p| p.display().to_string()),
        origins = config.origins.len(),
        single_tenant = config.single_tenant.is_some(),
        "configuration loaded"
    );

    Ok(ResolvedConfig {
        config,
        source,
        env_fallbacks,
    })
}

/// Parse configuration from a TOML string (no environment, no validation).
///
/// # Errors
///
/// Returns [`ConfigError::ParseError`] if the text is not a valid config.
pub fn parse_str(content: &str) -> ConfigResult<Config> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: "<string>".to_owned(),
        source: e,
    })
}

/// Read and parse a config file that must exist.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, is too large, or
/// cannot be parsed.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_checked(path, &content)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<Config>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };
    parse_checked(path, &content).map(Some)
}

fn parse_checked(path: &Path, content: &str) -> ConfigResult<Config> {
    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })
}
