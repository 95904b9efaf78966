// Shared transport configuration for building the reqwest::Client.
//
// Both the command call and the status call go through one client, so the
// request bound lives here rather than at each call site.

use std::time::Duration;

use crate::error::TransportError;

/// Bound applied to every request the client sends.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Transport configuration for building the HTTP client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("rtmpctl/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, TransportError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| TransportError::Other {
                message: format!("failed to build HTTP client: {e}"),
            })
    }
}
