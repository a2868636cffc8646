//! Post-load configuration validation.
//!
//! Hard errors stop startup. Origins that are syntactically fine but can
//! never admit anyone (no credential, no allowed paths) only warn here; the
//! authorizer refuses their connections individually.

use std::path::{Component, Path};

use regex::Regex;
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, OriginSection, SingleTenantSection};

/// Shape of the application's external address: `host:port`, no scheme.
pub const APP_HOST_PATTERN: &str = r"^[^:]+:[0-9]+$";

/// Validate a loaded configuration.
///
/// # Errors
///
/// Returns the first validation error found, or
/// [`ConfigError::NoOriginPolicy`] when no origin policy is configured.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_server(config)?;
    validate_logging(config)?;
    validate_tenancy(config)?;
    Ok(())
}

/// Check an external address against [`APP_HOST_PATTERN`].
#[must_use]
pub fn is_valid_app_host(app_host: &str) -> bool {
    Regex::new(APP_HOST_PATTERN).is_ok_and(|re| re.is_match(app_host))
}

/// Wrap an origin pattern so it must match the whole origin string.
#[must_use]
pub fn anchor_pattern(pattern: &str) -> String {
    format!("^(?:{pattern})$")
}

fn validate_server(config: &Config) -> ConfigResult<()> {
    let server = &config.server;

    if !is_valid_app_host(&server.app_host) {
        return Err(ConfigError::ValidationError {
            field: "server.app_host".to_owned(),
            message: format!(
                "'{}' is not a host:port pair (no scheme, numeric port)",
                server.app_host
            ),
        });
    }

    if server.virtual_root.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "server.virtual_root".to_owned(),
            message: "must be set (or provide SFTP_WS_ROOT)".to_owned(),
        });
    }

    if !server.virtual_root.is_absolute()
        || server
            .virtual_root
            .components()
            .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ConfigError::ValidationError {
            field: "server.virtual_root".to_owned(),
            message: format!(
                "'{}' must be an absolute path without '..'",
                server.virtual_root.display()
            ),
        });
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let format = config.logging.format();
    if !matches!(format, "pretty" | "compact" | "json" | "full") {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported format '{format}'; expected one of: pretty, compact, json, full"
            ),
        });
    }
    Ok(())
}

fn validate_tenancy(config: &Config) -> ConfigResult<()> {
    let has_single = config.single_tenant.is_some();
    let has_multi = !config.origins.is_empty();

    if has_single && has_multi {
        return Err(ConfigError::ValidationError {
            field: "single_tenant".to_owned(),
            message: "[single_tenant] and [[origins]] are mutually exclusive".to_owned(),
        });
    }

    if let Some(single) = &config.single_tenant {
        validate_single_tenant(single)?;
    }

    for (index, origin) in config.origins.iter().enumerate() {
        validate_origin(index, origin)?;
    }

    if config.tenancy().is_none() {
        return Err(ConfigError::NoOriginPolicy);
    }

    Ok(())
}

fn validate_single_tenant(single: &SingleTenantSection) -> ConfigResult<()> {
    for (index, pattern) in single.allowed_origins.iter().enumerate() {
        compile_pattern(&format!("single_tenant.allowed_origins[{index}]"), pattern)?;
    }

    if both_credentials(single.secret.as_ref(), single.public_key.as_ref()) {
        return Err(ConfigError::ValidationError {
            field: "single_tenant".to_owned(),
            message: "set either secret or public_key, not both".to_owned(),
        });
    }

    if single.credential().is_none() {
        return Err(ConfigError::ValidationError {
            field: "single_tenant".to_owned(),
            message: "a secret or public_key is required".to_owned(),
        });
    }

    Ok(())
}

fn validate_origin(index: usize, origin: &OriginSection) -> ConfigResult<()> {
    let field = format!("origins[{index}]");

    compile_pattern(&format!("{field}.pattern"), &origin.pattern)?;

    if both_credentials(origin.secret.as_ref(), origin.public_key.as_ref()) {
        return Err(ConfigError::ValidationError {
            field,
            message: "set either secret or public_key, not both".to_owned(),
        });
    }

    for (path_index, path) in origin.allowed_paths.iter().enumerate() {
        if !is_plain_relative(path) {
            return Err(ConfigError::ValidationError {
                field: format!("{field}.allowed_paths[{path_index}]"),
                message: format!("'{path}' must be a relative path without '.' or '..'"),
            });
        }
    }

    if origin.credential().is_none() {
        warn!(
            pattern = %origin.pattern,
            "origin has no credential; its connections will be refused"
        );
    }

    if origin.allowed_paths.is_empty() {
        warn!(
            pattern = %origin.pattern,
            "origin has no allowed paths; every token from it will be rejected"
        );
    }

    Ok(())
}

fn compile_pattern(field: &str, pattern: &str) -> ConfigResult<()> {
    if pattern.is_empty() {
        return Err(ConfigError::ValidationError {
            field: field.to_owned(),
            message: "pattern must not be empty".to_owned(),
        });
    }
    Regex::new(&anchor_pattern(pattern)).map_err(|e| ConfigError::ValidationError {
        field: field.to_owned(),
        message: format!("invalid regular expression: {e}"),
    })?;
    Ok(())
}

fn both_credentials(secret: Option<&String>, public_key: Option<&String>) -> bool {
    let set = |v: Option<&String>| v.is_some_and(|s| !s.trim().is_empty());
    set(secret) && set(public_key)
}

fn is_plain_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        && !path.split('/').any(|seg| seg == "." || seg == "..")
}
