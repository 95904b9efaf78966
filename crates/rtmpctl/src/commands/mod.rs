//! Command dispatch: bridges CLI args -> controller intents -> output.

pub mod config_cmd;
pub mod console;
pub mod status;
pub mod stream;
pub mod watch;

use rtmpctl_core::{ControllerSnapshot, StreamController};

use crate::cli::Command;
use crate::error::CliError;
use crate::output::Renderer;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &StreamController,
    out: &Renderer,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::handle(controller, out).await,
        Command::Start(args) => stream::start(controller, &args, out).await,
        Command::Stop => stream::stop(controller, out).await,
        Command::Watch => watch::handle(controller, out).await,
        Command::Console => console::handle(controller, out).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}

/// Wait for the startup probe; fails if no device address is configured.
pub async fn settled_with_address(
    controller: &StreamController,
) -> Result<ControllerSnapshot, CliError> {
    let snap = controller.settled().await?;
    if snap.address.is_none() {
        return Err(CliError::NoAddress);
    }
    Ok(snap)
}

/// Describe the device of `snap` as unreachable.
pub fn unreachable_error(snap: &ControllerSnapshot) -> CliError {
    CliError::Unreachable {
        address: snap
            .address
            .map_or_else(|| "(unset)".into(), |a| format!("{a}:{}", a.port())),
        message: snap
            .last_error
            .clone()
            .unwrap_or_else(|| "no response".into()),
    }
}
