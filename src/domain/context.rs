//! Request Context
//!
//! Metadata carried alongside a request for tracing.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

/// Context for a request, used for log correlation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    /// Correlation ID from the X-Correlation-Id header (opaque, caller supplied)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Client IP address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,
}

impl RequestContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context with correlation ID
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Create context with client IP
    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> &str {
        self.correlation_id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let context = RequestContext::new()
            .with_correlation_id("req-42")
            .with_client_ip(ip);

        assert_eq!(context.correlation_id.as_deref(), Some("req-42"));
        assert_eq!(context.client_ip, Some(ip));
    }

    #[test]
    fn test_ensure_correlation_id() {
        let mut context = RequestContext::new();
        assert!(context.correlation_id.is_none());

        let id = context.ensure_correlation_id().to_string();
        assert_eq!(context.correlation_id.as_deref(), Some(id.as_str()));

        // Calling again should return the same ID
        let id2 = context.ensure_correlation_id().to_string();
        assert_eq!(id, id2);
    }
}
