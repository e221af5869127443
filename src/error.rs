//! Error types for the SFU signaling client

use crate::signaling::protocol::Method;

/// Result type alias using the crate [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by session, path, and signaling operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The signaling channel dropped while a request was pending. All
    /// pending requests fail with this error and the session becomes
    /// disconnected; the core does not reconnect.
    #[error("signaling channel closed")]
    ChannelClosed,

    /// The runtime environment cannot host the media engine. Fatal to the
    /// session; reported, not retried.
    #[error("media engine unsupported: {0}")]
    UnsupportedEngine(String),

    /// Capability negotiation was already performed on this session
    #[error("capabilities already negotiated for this session")]
    AlreadyNegotiated,

    /// The server rejected a security-handshake request. The affected
    /// transport is marked failed and is never reused.
    #[error("transport negotiation failed: {0}")]
    NegotiationFailed(String),

    /// The local media source could not be acquired. Raised before any
    /// signaling request, so no server-side state exists.
    #[error("media source unavailable: {0}")]
    SourceUnavailable(String),

    /// A dependent request was issued before its prerequisite step
    /// completed (e.g. `consume` before the security handshake)
    #[error("transport not ready: {0}")]
    TransportNotReady(String),

    /// A producer or consumer path was invoked before capability
    /// negotiation succeeded
    #[error("capabilities not negotiated yet")]
    NotNegotiated,

    /// A session or transport operation violated a lifecycle precondition
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The server answered a request with an error payload
    #[error("server rejected {method}: {message}")]
    Request {
        /// Method the server rejected
        method: Method,
        /// Server-provided error message
        message: String,
    },

    /// A request exceeded the configured timeout
    #[error("request {0} timed out")]
    RequestTimeout(Method),

    /// Invalid configuration parameter
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// WebSocket connection error
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error ends the session (no transport or path on the
    /// session is usable afterwards)
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ChannelClosed | Error::UnsupportedEngine(_))
    }

    /// Check if this error is a local precondition violation rather than a
    /// signaling failure
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Error::AlreadyNegotiated
                | Error::NotNegotiated
                | Error::InvalidState(_)
                | Error::TransportNotReady(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Request {
            method: Method::Produce,
            message: "no transport".to_string(),
        };
        assert_eq!(err.to_string(), "server rejected produce: no transport");
    }

    #[test]
    fn test_error_is_fatal() {
        assert!(Error::ChannelClosed.is_fatal());
        assert!(Error::UnsupportedEngine("no media stack".to_string()).is_fatal());
        assert!(!Error::AlreadyNegotiated.is_fatal());
    }

    #[test]
    fn test_error_is_usage_error() {
        assert!(Error::AlreadyNegotiated.is_usage_error());
        assert!(Error::NotNegotiated.is_usage_error());
        assert!(!Error::ChannelClosed.is_usage_error());
    }
}
