//! Origin-level ceiling on token grants.

use tracing::warn;

/// Checks that a token's requested paths are all allowed for its origin.
///
/// Membership is exact: `client-a` does not allow `client-a/sub`, and one
/// non-member fails the whole request.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathPolicyEnforcer;

impl PathPolicyEnforcer {
    /// Whether every requested path is in `allowed`.
    ///
    /// An absent or empty allowed set rejects everything.
    #[must_use]
    pub fn authorize(&self, requested: &[String], allowed: Option<&[String]>) -> bool {
        let allowed = match allowed {
            Some(allowed) if !allowed.is_empty() => allowed,
            _ => {
                warn!(
                    requested = ?requested,
                    "rejecting grant: origin has no allowed paths"
                );
                return false;
            },
        };

        let outside: Vec<&String> = requested
            .iter()
            .filter(|path| !allowed.contains(*path))
            .collect();

        if outside.is_empty() {
            return true;
        }

        warn!(
            requested = ?requested,
            allowed = ?allowed,
            outside = ?outside,
            "rejecting grant: requested paths exceed the origin's allowed paths"
        );
        false
    }
}
