// ── Core error types ──
//
// Errors returned synchronously to callers of the controller. Network
// failures during a command or poll do NOT surface here: they are reported
// as `ControllerEvent::ConnectionError` and the controller stays usable.

use thiserror::Error;

use rtmpctl_api::{AddressError, TransportError};

use crate::model::Phase;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input errors ─────────────────────────────────────────────────
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Device address cannot change while the controller is {phase}")]
    AddressLocked { phase: Phase },

    // ── Collaborator errors ──────────────────────────────────────────
    #[error("Configuration store failed: {0}")]
    Repository(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Transport(#[from] TransportError),

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Stream controller has shut down")]
    ControllerStopped,
}

/// Input rejected before it reaches the network or the config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    MalformedAddress(#[from] AddressError),

    #[error("No device address configured")]
    AddressUnset,
}

impl From<AddressError> for CoreError {
    fn from(err: AddressError) -> Self {
        Self::Validation(ValidationError::MalformedAddress(err))
    }
}

/// The device answered, but not with a status token we understand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unrecognized status token '{token}'")]
    UnrecognizedToken { token: String },
}
