//! Transport seam between the client core and the upstream API.
//!
//! A [`Connector`] establishes a [`Transport`] when a client scope is opened
//! (for HTTP this is the connection pool) and is handed it back when the
//! scope closes. The transport sends one [`ApiRequest`] per `execute` call
//! and returns the decoded JSON payload. Retries, admission control and
//! caching all belong to the client.

mod http;
pub mod mock;
mod request;

pub use http::{HttpConnector, HttpTransport};
pub use mock::{MockConnector, MockTransport};
pub use request::{ApiRequest, RequestKind};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::ArchiveError;

/// Executes requests against the upstream
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Execute a request and return the decoded response body
    async fn execute(&self, request: &ApiRequest) -> Result<Value, TransportError>;
}

/// Creates transports for client scopes
pub trait Connector: Send + Sync + std::fmt::Debug {
    /// Establish the transport (connection pool) for a new scope
    fn connect(&self, config: &Config) -> Result<Arc<dyn Transport>, ArchiveError>;

    /// Called exactly once when the scope that connected `transport` ends
    fn release(&self, transport: Arc<dyn Transport>) {
        drop(transport);
    }
}

/// Network or upstream failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// Could not reach the upstream
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The request timed out
    #[error("Request timed out")]
    Timeout,

    /// The upstream answered with a non-success status
    #[error("Upstream returned status {status}: {message}")]
    Status {
        status: u16,
        message: String,
        /// Server-requested backoff (`Retry-After`)
        retry_after: Option<Duration>,
    },

    /// The response body could not be decoded
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether the failure is worth retrying: connectivity problems,
    /// timeouts, throttling (429) and server errors (5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Connect(_) | TransportError::Timeout => true,
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            TransportError::Decode(_) => false,
        }
    }

    /// HTTP status, if the upstream answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-requested backoff, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransportError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Shorthand for a non-success status without a retry hint
    pub fn status_code(status: u16, message: impl Into<String>) -> Self {
        TransportError::Status {
            status,
            message: message.into(),
            retry_after: None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::status_code(status.as_u16(), err.to_string())
        } else {
            TransportError::Connect(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_split() {
        assert!(TransportError::Connect("refused".into()).is_transient());
        assert!(TransportError::Timeout.is_transient());
        assert!(TransportError::status_code(429, "throttled").is_transient());
        assert!(TransportError::status_code(503, "unavailable").is_transient());
        assert!(!TransportError::status_code(404, "missing").is_transient());
        assert!(!TransportError::status_code(401, "bad key").is_transient());
        assert!(!TransportError::Decode("eof".into()).is_transient());
    }

    #[test]
    fn test_status_accessors() {
        let err = TransportError::Status {
            status: 429,
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(TransportError::Timeout.status(), None);
    }
}
