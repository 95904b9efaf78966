//! `rtmpctl start` / `rtmpctl stop`.

use rtmpctl_core::{Phase, StreamController};

use super::{settled_with_address, watch};
use crate::cli::StartArgs;
use crate::error::CliError;
use crate::output::Renderer;

pub async fn start(
    controller: &StreamController,
    args: &StartArgs,
    out: &Renderer,
) -> Result<(), CliError> {
    // A device found already streaming makes the start request a no-op.
    settled_with_address(controller).await?;
    controller.request_start().await?;
    let snap = controller.settled().await?;
    if snap.phase == Phase::Error {
        return Err(CliError::StartFailed {
            message: snap.last_error.unwrap_or_default(),
        });
    }
    out.print(&out.snapshot(&snap)?);

    if args.watch {
        watch::follow(controller, out).await?;
    }
    Ok(())
}

pub async fn stop(controller: &StreamController, out: &Renderer) -> Result<(), CliError> {
    settled_with_address(controller).await?;
    controller.request_stop().await?;
    let snap = controller.settled().await?;
    out.print(&out.snapshot(&snap)?);
    Ok(())
}
