// Device control HTTP client
//
// Wraps `reqwest::Client` with the device's two control endpoints. Each
// method performs exactly one request and never retries; retry policy
// belongs to the caller.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, trace};
use url::Url;

use crate::address::DeviceAddress;
use crate::error::TransportError;
use crate::transport::{DEFAULT_TIMEOUT, TransportConfig};

/// Value of the `type` query parameter for the HDMI capture pipeline.
const CONTROL_TYPE: &str = "hdmi_main";

/// Body and status of a successful exchange.
///
/// The body is kept verbatim; interpretation is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    /// The body with surrounding whitespace removed.
    pub fn token(&self) -> &str {
        self.body.trim()
    }
}

/// Raw HTTP client for the device's control service.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl DeviceClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(transport: &TransportConfig) -> Result<Self, TransportError> {
        Ok(Self {
            http: transport.build_client()?,
            timeout: transport.timeout,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    ///
    /// Requests are still bounded by [`DEFAULT_TIMEOUT`], whatever the
    /// client's own settings are.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /set_ctl?type=hdmi_main&rtmp_enable={0|1}`
    ///
    /// The acknowledgement body has no defined format; only the success of
    /// the exchange matters to callers.
    pub async fn set_desired_state(
        &self,
        address: &DeviceAddress,
        enabled: bool,
    ) -> Result<RawResponse, TransportError> {
        let mut url = endpoint(address, "set_ctl")?;
        url.query_pairs_mut()
            .append_pair("type", CONTROL_TYPE)
            .append_pair("rtmp_enable", if enabled { "1" } else { "0" });
        self.get(url).await
    }

    /// `GET /get_ctl?type=hdmi_main`
    ///
    /// The body is a single token, `1` while streaming and `0` when stopped.
    pub async fn get_observed_state(
        &self,
        address: &DeviceAddress,
    ) -> Result<RawResponse, TransportError> {
        let mut url = endpoint(address, "get_ctl")?;
        url.query_pairs_mut().append_pair("type", CONTROL_TYPE);
        self.get(url).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get(&self, url: Url) -> Result<RawResponse, TransportError> {
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e, self.timeout))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&e, self.timeout))?;

        if !status.is_success() {
            return Err(TransportError::Other {
                message: format!("HTTP {status} from {url}"),
            });
        }

        trace!(status = status.as_u16(), body = %body.trim(), "device response");
        Ok(RawResponse {
            status: status.as_u16(),
            body,
        })
    }
}

fn endpoint(address: &DeviceAddress, path: &str) -> Result<Url, TransportError> {
    address
        .base_url()
        .and_then(|base| base.join(path))
        .map_err(|e| TransportError::Other {
            message: format!("invalid device URL: {e}"),
        })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn token_trims_line_endings() {
        let resp = RawResponse {
            status: 200,
            body: "1\r\n".into(),
        };
        assert_eq!(resp.token(), "1");
    }

    #[test]
    fn endpoint_joins_path_under_base() {
        let addr = DeviceAddress::parse("10.1.2.3").unwrap();
        assert_eq!(
            endpoint(&addr, "get_ctl").unwrap().as_str(),
            "http://10.1.2.3:8080/get_ctl"
        );
    }
}
