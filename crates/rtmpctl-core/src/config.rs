// ── Runtime controller configuration ──
//
// These types describe *how* the controller talks to the device. They never
// touch disk themselves: persistence sits behind `AddressRepository`, which
// the binary backs with the config file.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rtmpctl_api::transport::DEFAULT_TIMEOUT;
use rtmpctl_api::{DEFAULT_PORT, DeviceAddress, TransportConfig};

use crate::error::CoreError;

/// Tuning for a single controller instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Pause between two status requests of a monitoring session.
    pub poll_interval: Duration,
    /// Bound on every request, command and status alike.
    pub request_timeout: Duration,
    /// Control port used for every device address, loaded or entered.
    pub device_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            request_timeout: DEFAULT_TIMEOUT,
            device_port: DEFAULT_PORT,
        }
    }
}

impl ControllerConfig {
    /// Build a [`TransportConfig`] from the controller configuration.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default().with_timeout(self.request_timeout)
    }
}

/// Persistence for the device address.
///
/// `load` runs once when a controller is built; `save` only after an
/// address has passed validation and been accepted.
pub trait AddressRepository: Send + Sync {
    /// `Ok(None)` means no address is configured.
    fn load(&self) -> Result<Option<DeviceAddress>, CoreError>;

    fn save(&self, address: &DeviceAddress) -> Result<(), CoreError>;
}

/// Process-local repository; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryAddressRepository {
    address: Mutex<Option<DeviceAddress>>,
    saves: AtomicUsize,
}

impl MemoryAddressRepository {
    pub fn new(address: Option<DeviceAddress>) -> Self {
        Self {
            address: Mutex::new(address),
            saves: AtomicUsize::new(0),
        }
    }

    /// How many times `save` has been called.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<DeviceAddress> {
        *self.address.lock().expect("address lock poisoned")
    }
}

impl AddressRepository for MemoryAddressRepository {
    fn load(&self) -> Result<Option<DeviceAddress>, CoreError> {
        Ok(self.current())
    }

    fn save(&self, address: &DeviceAddress) -> Result<(), CoreError> {
        *self.address.lock().expect("address lock poisoned") = Some(*address);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
