// ── Domain model ──
//
// Streaming state as the operator wants it (`DesiredState`), as the device
// last reported it (`ObservedState`), and the events and snapshots the
// controller publishes to presentation adapters.

use serde::{Deserialize, Serialize};
use strum::Display;

use rtmpctl_api::DeviceAddress;

use crate::error::ProtocolError;

/// What the operator last asked for.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DesiredState {
    #[default]
    Stopped,
    Streaming,
}

/// What the device last reported.
///
/// Only ever written from a poll result; never inferred from a command.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ObservedState {
    #[default]
    Unknown,
    Stopped,
    Streaming,
    Unreachable,
}

impl ObservedState {
    /// Interpret a status body: `"1"` is streaming, `"0"` is stopped.
    ///
    /// Surrounding whitespace is ignored. Every other token is a protocol
    /// error, which callers report as [`ObservedState::Unreachable`].
    pub fn from_token(token: &str) -> Result<Self, ProtocolError> {
        match token.trim() {
            "1" => Ok(Self::Streaming),
            "0" => Ok(Self::Stopped),
            other => Err(ProtocolError::UnrecognizedToken {
                token: other.to_owned(),
            }),
        }
    }
}

/// Why a [`StateChangeEvent`] was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeReason {
    PollResult,
    CommandAck,
    CommandFailure,
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChangeEvent {
    pub observed: ObservedState,
    pub reason: ChangeReason,
}

/// Notification published to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControllerEvent {
    StateChanged(StateChangeEvent),
    ConnectionError { message: String, reason: ChangeReason },
}

impl ControllerEvent {
    pub fn reason(&self) -> ChangeReason {
        match self {
            Self::StateChanged(change) => change.reason,
            Self::ConnectionError { reason, .. } => *reason,
        }
    }
}

/// Controller lifecycle phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Phase {
    /// No monitoring session (a startup probe may still be in flight).
    #[default]
    Idle,
    /// Start command in flight.
    Starting,
    /// Start confirmed, status poller running.
    Monitoring,
    /// Stop command in flight, poller already retired.
    Stopping,
    /// Last operation failed; the device is presumed unreachable.
    Error,
}

/// Point-in-time view of the controller, published on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControllerSnapshot {
    pub phase: Phase,
    pub desired: DesiredState,
    pub observed: ObservedState,
    pub address: Option<DeviceAddress>,
    /// The one-shot startup check has not answered yet.
    pub probing: bool,
    pub last_error: Option<String>,
}

impl ControllerSnapshot {
    /// Whether the start/stop control should accept input.
    pub fn controls_enabled(&self) -> bool {
        !self.probing && !matches!(self.phase, Phase::Starting | Phase::Stopping)
    }

    /// Whether the device address may be changed.
    pub fn address_editable(&self) -> bool {
        matches!(self.phase, Phase::Idle | Phase::Error)
    }
}
