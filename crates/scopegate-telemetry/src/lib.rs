//! Scopegate Telemetry - Logging and connection tracing.
//!
//! This crate provides:
//! - Configurable logging setup with multiple formats
//! - A per-connection context whose span tags every admission log line
//!
//! # Example
//!
//! ```rust,no_run
//! use scopegate_telemetry::{ConnectionContext, LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), scopegate_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("scopegate_vfs=debug");
//!
//! setup_logging(&config)?;
//!
//! let ctx = ConnectionContext::new(Some("https://a.example"));
//! let span = ctx.span();
//! let _guard = span.enter();
//! tracing::info!("Authorizing connection");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod context;
mod error;
mod logging;

pub use context::ConnectionContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_logging};
