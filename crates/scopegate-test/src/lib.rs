//! Shared test utilities for scopegate.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! scopegate-test.workspace = true
//! ```
//!
//! Then mint tokens and build trees in tests:
//!
//! ```rust,ignore
//! use scopegate_test::{FileTree, TokenFactory};
//!
//! let tree = FileTree::tenants();
//! let token = TokenFactory::hmac(b"secret")
//!     .claims("https://a.example", "files.example:443")
//!     .paths(["client-a"])
//!     .mint();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod keys;
pub mod tokens;
pub mod tree;

pub use tokens::{DEFAULT_TTL_SECS, TokenBuilder, TokenFactory, base64_secret};
pub use tree::{FileTree, setup_test_logging};
