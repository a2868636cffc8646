//! Configuration for scopegate.
//!
//! Configuration comes from one optional TOML file plus environment
//! variable fallbacks for any field the file leaves unset:
//!
//! ```toml
//! [server]
//! app_host = "files.example.com:443"
//! virtual_root = "/srv/files"
//!
//! [[origins]]
//! pattern = "https://a\\.example"
//! secret = "c2VjcmV0"
//! allowed_paths = ["client-a"]
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use scopegate_config::{collect_env_vars, load};
//!
//! let resolved = load(None, &collect_env_vars()).unwrap();
//! println!("audience: {}", resolved.config.server.app_host);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod env;
mod error;
mod loader;
mod types;
pub mod validate;

pub use env::{apply_env_fallbacks, collect_env_vars, parse_origin_restrictions};
pub use error::{ConfigError, ConfigResult};
pub use loader::{ResolvedConfig, SYSTEM_CONFIG_PATH, load, load_file, parse_str};
pub use types::{
    Config, CredentialSource, LoggingSection, OriginSection, ServerSection, SingleTenantSection,
    Tenancy,
};
pub use validate::{APP_HOST_PATTERN, anchor_pattern, is_valid_app_host};
