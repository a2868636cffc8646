//! CLI command implementations.

pub(crate) mod admit;
pub(crate) mod check;
