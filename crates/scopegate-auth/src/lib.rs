//! Connection authorization for scopegate.
//!
//! Decides, per incoming file-transfer connection:
//!
//! 1. whether its `Origin` is trusted ([`OriginMatcher`]),
//! 2. which credential verifies that origin's tokens ([`CredentialResolver`]),
//! 3. whether the token is valid for this application and origin
//!    ([`TokenAuthorizer`]),
//! 4. whether the token's path grants stay within the origin's allowed paths
//!    ([`PathPolicyEnforcer`]),
//!
//! and then hands the session a [`ScopedVfs`](scopegate_vfs::ScopedVfs) in
//! which everything outside the grant is invisible. [`Authorizer::admit`] is
//! the single entry point the transport calls.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod authorizer;
mod credential;
mod error;
mod grant;
mod origin;
mod policy;
mod resolver;
mod token;

pub use authorizer::{
    Admission, Authorizer, ConnectionRequest, FilesystemProvider, HostFilesystemProvider, Refusal,
    SessionInit, TOKEN_QUERY_PARAM,
};
pub use credential::{Credential, KeyFamily};
pub use error::{AuthError, AuthResult};
pub use grant::{InvalidGrantPath, SessionGrant};
pub use origin::{OriginMatcher, OriginPattern};
pub use policy::PathPolicyEnforcer;
pub use resolver::{
    CredentialResolver, MultiTenantResolver, Resolution, SingleTenantResolver, TenantPolicy,
    resolver_from_config,
};
pub use token::{Audience, IdentityClaims, TokenAuthorizer, TokenRejection, Verification};
