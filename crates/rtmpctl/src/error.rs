//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use rtmpctl_config::ConfigError;
use rtmpctl_core::{CoreError, ValidationError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Device ───────────────────────────────────────────────────────
    #[error("Device at {address} is not responding")]
    #[diagnostic(
        code(rtmpctl::unreachable),
        help(
            "Check that the device is powered on and reachable.\n\
             {message}\n\
             Try: rtmpctl status --timeout-ms 2000"
        )
    )]
    Unreachable { address: String, message: String },

    #[error("Device rejected the start command")]
    #[diagnostic(
        code(rtmpctl::start_failed),
        help("{message}\nThe stream was not started; run `rtmpctl start` to retry.")
    )]
    StartFailed { message: String },

    // ── Address ──────────────────────────────────────────────────────
    #[error("No device address configured")]
    #[diagnostic(
        code(rtmpctl::no_address),
        help(
            "Set one with: rtmpctl config set-address <ip>\n\
             Or pass --device <ip> for a single run."
        )
    )]
    NoAddress,

    #[error("Device address cannot change while the controller is {phase}")]
    #[diagnostic(code(rtmpctl::address_locked), help("Stop streaming first: rtmpctl stop"))]
    AddressLocked { phase: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(rtmpctl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(rtmpctl::config),
        help("Inspect the file with: rtmpctl config show")
    )]
    Config(#[from] ConfigError),

    #[error("Could not save the device address")]
    #[diagnostic(code(rtmpctl::storage))]
    Storage {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("HTTP client setup failed: {message}")]
    #[diagnostic(code(rtmpctl::transport))]
    Transport { message: String },

    #[error("Stream controller stopped unexpectedly")]
    #[diagnostic(code(rtmpctl::stopped))]
    ControllerStopped,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON output failed: {0}")]
    #[diagnostic(code(rtmpctl::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } | Self::StartFailed { .. } => exit_code::CONNECTION,
            Self::NoAddress | Self::Validation { .. } => exit_code::USAGE,
            Self::AddressLocked { .. } => exit_code::CONFLICT,
            _ => exit_code::GENERAL,
        }
    }
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(ValidationError::MalformedAddress(e)) => CliError::Validation {
                field: "address".into(),
                reason: e.to_string(),
            },
            CoreError::Validation(ValidationError::AddressUnset) => CliError::NoAddress,
            CoreError::AddressLocked { phase } => CliError::AddressLocked {
                phase: phase.to_string(),
            },
            CoreError::Repository(source) => CliError::Storage { source },
            CoreError::Transport(e) => CliError::Transport {
                message: e.to_string(),
            },
            CoreError::ControllerStopped => CliError::ControllerStopped,
        }
    }
}
