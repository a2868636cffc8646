//! Environment variable fallbacks.
//!
//! The environment is captured once into a map by [`collect_env_vars`] and
//! then threaded through loading, so tests can inject variables without
//! touching process state.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use serde::de::{MapAccess, Visitor};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, OriginSection, SingleTenantSection};

/// Preferred variable for the external `host:port`.
pub const ENV_APP_HOST: &str = "SCOPEGATE_APP_HOST";
/// Legacy variable for the external `host:port`.
pub const ENV_LEGACY_APP_HOST: &str = "SFTP_WS_APP_HOST";
/// Host half of the default `host:port`.
pub const ENV_HOST: &str = "SFTP_WS_HOST";
/// Port half of the default `host:port`.
pub const ENV_PORT: &str = "SFTP_WS_PORT";
/// Directory presented to sessions as `/`.
pub const ENV_ROOT: &str = "SFTP_WS_ROOT";
/// JSON object mapping origin patterns to credential and allowed paths.
pub const ENV_ORIGIN_RESTRICTIONS: &str = "SFTP_WS_ORIGIN_RESTRICTIONS";
/// Base64 HMAC secret for single-tenant mode.
pub const ENV_HMAC_SECRET: &str = "JWT_HMAC_SECRET";
/// JSON array of origin regexes for single-tenant mode.
pub const ENV_ALLOWED_ORIGINS: &str = "ALLOWED_ORIGIN_REGEXES";
/// Log level override.
pub const ENV_LOG: &str = "SCOPEGATE_LOG";
/// Config file location.
pub const ENV_CONFIG: &str = "SCOPEGATE_CONFIG";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: &str = "4002";

/// Snapshot the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

fn non_empty<'a>(env: &'a HashMap<String, String>, var: &str) -> Option<&'a str> {
    env.get(var).map(String::as_str).filter(|v| !v.trim().is_empty())
}

/// Fill fields the file left unset from environment variables.
///
/// Returns the number of fields populated from the environment.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] when a JSON-valued variable is malformed.
pub fn apply_env_fallbacks(
    config: &mut Config,
    env: &HashMap<String, String>,
) -> ConfigResult<usize> {
    let mut applied = 0usize;

    if config.server.app_host.trim().is_empty() {
        config.server.app_host = app_host_from_env(env);
        applied = applied.saturating_add(1);
    }

    if config.server.virtual_root.as_os_str().is_empty() {
        if let Some(root) = non_empty(env, ENV_ROOT) {
            config.server.virtual_root = PathBuf::from(root);
            applied = applied.saturating_add(1);
        }
    }

    if config.logging.level.is_none() {
        if let Some(level) = non_empty(env, ENV_LOG) {
            config.logging.level = Some(level.to_owned());
            applied = applied.saturating_add(1);
        }
    }

    if config.origins.is_empty() {
        if let Some(raw) = non_empty(env, ENV_ORIGIN_RESTRICTIONS) {
            config.origins = parse_origin_restrictions(raw)?;
            debug!(
                count = config.origins.len(),
                "loaded origin restrictions from environment"
            );
            applied = applied.saturating_add(1);
        }
    }

    // The multi-tenant map takes precedence over the legacy variables.
    if config.single_tenant.is_none() && config.origins.is_empty() {
        if let Some(single) = single_tenant_from_env(env)? {
            config.single_tenant = Some(single);
            applied = applied.saturating_add(1);
        }
    }

    Ok(applied)
}

fn single_tenant_from_env(
    env: &HashMap<String, String>,
) -> ConfigResult<Option<SingleTenantSection>> {
    let Some(secret) = non_empty(env, ENV_HMAC_SECRET) else {
        return Ok(None);
    };
    let allowed_origins = match non_empty(env, ENV_ALLOWED_ORIGINS) {
        Some(raw) => {
            serde_json::from_str::<Vec<String>>(raw).map_err(|e| ConfigError::EnvError {
                var: ENV_ALLOWED_ORIGINS.to_owned(),
                message: format!("expected a JSON array of strings: {e}"),
            })?
        },
        None => Vec::new(),
    };
    Ok(Some(SingleTenantSection {
        allowed_origins,
        secret: Some(secret.to_owned()),
        public_key: None,
    }))
}

fn app_host_from_env(env: &HashMap<String, String>) -> String {
    if let Some(host) = non_empty(env, ENV_APP_HOST).or_else(|| non_empty(env, ENV_LEGACY_APP_HOST))
    {
        return host.to_owned();
    }
    let host = non_empty(env, ENV_HOST).unwrap_or(DEFAULT_HOST);
    let port = non_empty(env, ENV_PORT).unwrap_or(DEFAULT_PORT);
    format!("{host}:{port}")
}

/// One value of the `SFTP_WS_ORIGIN_RESTRICTIONS` object.
#[derive(Deserialize)]
struct RestrictionEntry {
    #[serde(default)]
    public_key: Option<String>,
    #[serde(default)]
    secret: Option<String>,
    #[serde(default)]
    allowed_paths: Vec<String>,
}

/// The restriction object, with key order kept.
struct OrderedRestrictions(Vec<OriginSection>);

impl<'de> Deserialize<'de> for OrderedRestrictions {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RestrictionsVisitor;

        impl<'de> Visitor<'de> for RestrictionsVisitor {
            type Value = OrderedRestrictions;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping origin patterns to restrictions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut origins = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((pattern, entry)) = map.next_entry::<String, RestrictionEntry>()? {
                    origins.push(OriginSection {
                        pattern,
                        secret: entry.secret,
                        public_key: entry.public_key,
                        allowed_paths: entry.allowed_paths,
                    });
                }
                Ok(OrderedRestrictions(origins))
            }
        }

        deserializer.deserialize_map(RestrictionsVisitor)
    }
}

/// Parse the multi-tenant restriction map, preserving key order.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if the value is not a JSON object of
/// the expected shape.
pub fn parse_origin_restrictions(raw: &str) -> ConfigResult<Vec<OriginSection>> {
    serde_json::from_str::<OrderedRestrictions>(raw)
        .map(|r| r.0)
        .map_err(|e| ConfigError::EnvError {
            var: ENV_ORIGIN_RESTRICTIONS.to_owned(),
            message: e.to_string(),
        })
}
