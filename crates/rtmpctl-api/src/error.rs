use thiserror::Error;

/// Failure of a single HTTP exchange with the device.
///
/// Every call in [`DeviceClient`](crate::DeviceClient) returns one of these
/// instead of panicking or leaking `reqwest` internals. `rtmpctl-core` maps
/// them into connection-level diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No response within the configured bound.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Nothing is listening at the device address, or the host is unreachable.
    #[error("connection refused by {url}")]
    ConnectionRefused { url: String },

    /// Anything else: non-2xx status, unreadable body, client build failure.
    #[error("transport error: {message}")]
    Other { message: String },
}

impl TransportError {
    /// Classify a `reqwest` failure.
    ///
    /// `timeout` is the bound that was applied to the request; reqwest does
    /// not report it back, so the caller passes it in for the message.
    pub fn from_reqwest(err: &reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else if err.is_connect() {
            Self::ConnectionRefused {
                url: err
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string),
            }
        } else {
            Self::Other {
                message: err.to_string(),
            }
        }
    }

    /// Returns `true` if a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::ConnectionRefused { .. })
    }
}

/// Rejected device address input.
///
/// Raised before anything is stored or sent over the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("malformed device address '{input}': {reason}")]
    Malformed { input: String, reason: String },
}
