//! Per-connection context for correlating admission log lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context for one incoming connection attempt.
///
/// Every log line emitted while authorizing the connection (and while the
/// resulting session runs) should be inside [`ConnectionContext::span`], so
/// operators can follow a single connection across components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionContext {
    /// Unique connection identifier.
    pub connection_id: Uuid,
    /// The declared `Origin` header, if any.
    pub origin: Option<String>,
    /// When the connection attempt started.
    pub started_at: DateTime<Utc>,
}

impl ConnectionContext {
    /// Create a context for a new connection attempt.
    #[must_use]
    pub fn new(origin: Option<&str>) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            origin: origin.map(ToOwned::to_owned),
            started_at: Utc::now(),
        }
    }

    /// Milliseconds since the connection attempt started.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
    }

    /// A tracing span carrying the connection's identifying fields.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "connection",
            connection_id = %self.connection_id,
            origin = self.origin.as_deref().unwrap_or("<none>"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_unique() {
        let a = ConnectionContext::new(Some("https://a.example"));
        let b = ConnectionContext::new(Some("https://a.example"));
        assert_ne!(a.connection_id, b.connection_id);
        assert_eq!(a.origin.as_deref(), Some("https://a.example"));
    }

    #[test]
    fn test_missing_origin() {
        let ctx = ConnectionContext::new(None);
        assert!(ctx.origin.is_none());
        assert!(ctx.elapsed_ms() >= 0);
    }

    #[test]
    fn test_serialization() {
        let ctx = ConnectionContext::new(Some("https://a.example"));
        let json = serde_json::to_string(&ctx).unwrap();
        let parsed: ConnectionContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.connection_id, ctx.connection_id);
    }
}
