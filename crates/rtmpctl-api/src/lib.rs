// rtmpctl-api: Async HTTP client for a capture device's RTMP control endpoints

pub mod address;
pub mod client;
pub mod error;
pub mod transport;

pub use address::{DEFAULT_PORT, DeviceAddress};
pub use client::{DeviceClient, RawResponse};
pub use error::{AddressError, TransportError};
pub use transport::TransportConfig;
