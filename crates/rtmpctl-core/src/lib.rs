//! State-synchronization engine between a local operator and a remote
//! capture device's RTMP streaming switch.
//!
//! - **[`StreamController`]**: The state machine. Owns the desired and
//!   observed streaming state, issues start/stop commands, supervises the
//!   status poller and publishes [`ControllerEvent`]s. All mutation runs on a
//!   single actor task; intents, command results and poll results are
//!   serialized through one channel.
//!
//! - **[`StatusPoller`]**: Launches cancellable [`PollSession`]s that
//!   repeatedly ask the device for its streaming state. At most one session
//!   is alive per controller.
//!
//! - **[`DeviceTransport`]**: The seam to the wire layer. Implemented for
//!   [`rtmpctl_api::DeviceClient`]; tests substitute scripted devices.
//!
//! - **[`AddressRepository`]**: Where the device address is persisted.
//!   Called only on construction and on an accepted address change.

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod poller;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{AddressRepository, ControllerConfig, MemoryAddressRepository};
pub use controller::StreamController;
pub use error::{CoreError, ProtocolError, ValidationError};
pub use model::{
    ChangeReason, ControllerEvent, ControllerSnapshot, DesiredState, ObservedState, Phase,
    StateChangeEvent,
};
pub use poller::{
    PollError, PollMode, PollOutcome, PollSession, SessionCounters, SessionId, SessionStats,
    StatusPoller,
};
pub use transport::DeviceTransport;

pub use rtmpctl_api::{AddressError, DeviceAddress, TransportError};
