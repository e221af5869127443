//! Configuration types for the signaling session

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for a [`Session`](crate::Session)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// WebSocket signaling server URL (ws:// or wss://)
    pub signaling_url: String,

    /// Prefer UDP over TCP when the server allocates transports
    /// (default: true)
    pub prefer_udp: bool,

    /// Optional per-request timeout. The base design waits indefinitely;
    /// set this to bound each signaling request.
    pub request_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signaling_url: "wss://localhost:3000/server".to_string(),
            prefer_udp: true,
            request_timeout: None,
        }
    }
}

impl SessionConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `signaling_url` is not a ws:// or wss:// URL
    /// - `request_timeout` is zero
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if !self.signaling_url.starts_with("ws://") && !self.signaling_url.starts_with("wss://") {
            return Err(Error::InvalidConfig(format!(
                "signaling_url must start with ws:// or wss://, got {}",
                self.signaling_url
            )));
        }

        if self.request_timeout == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig(
                "request_timeout must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
