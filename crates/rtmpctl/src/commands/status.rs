//! `rtmpctl status`: one probe, one line.

use rtmpctl_core::{ObservedState, StreamController};

use super::{settled_with_address, unreachable_error};
use crate::error::CliError;
use crate::output::Renderer;

pub async fn handle(controller: &StreamController, out: &Renderer) -> Result<(), CliError> {
    let snap = settled_with_address(controller).await?;
    if snap.observed == ObservedState::Unreachable {
        return Err(unreachable_error(&snap));
    }
    out.print(&out.snapshot(&snap)?);
    Ok(())
}
