// ── Device transport seam ──
//
// The controller and poller only need two calls from the wire layer. Keeping
// them behind a trait lets tests drive the state machine with a scripted
// device and a paused clock.

use std::future::Future;

use rtmpctl_api::{DeviceAddress, DeviceClient, RawResponse, TransportError};

/// The two device calls the engine depends on.
///
/// Each call performs exactly one request and must be bounded in time.
pub trait DeviceTransport: Send + Sync + 'static {
    /// Ask the device to enable or disable streaming.
    fn set_desired_state(
        &self,
        address: &DeviceAddress,
        enabled: bool,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;

    /// Read the device's current streaming token.
    fn get_observed_state(
        &self,
        address: &DeviceAddress,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

impl DeviceTransport for DeviceClient {
    async fn set_desired_state(
        &self,
        address: &DeviceAddress,
        enabled: bool,
    ) -> Result<RawResponse, TransportError> {
        DeviceClient::set_desired_state(self, address, enabled).await
    }

    async fn get_observed_state(
        &self,
        address: &DeviceAddress,
    ) -> Result<RawResponse, TransportError> {
        DeviceClient::get_observed_state(self, address).await
    }
}
