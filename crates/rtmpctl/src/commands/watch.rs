//! `rtmpctl watch`: print every controller event until Ctrl-C.

use std::pin::pin;

use tokio_stream::StreamExt;

use rtmpctl_core::StreamController;

use super::settled_with_address;
use crate::error::CliError;
use crate::output::Renderer;

pub async fn handle(controller: &StreamController, out: &Renderer) -> Result<(), CliError> {
    let snap = settled_with_address(controller).await?;
    out.print(&out.snapshot(&snap)?);
    follow(controller, out).await
}

/// Stream events to stdout until Ctrl-C or controller shutdown.
pub async fn follow(controller: &StreamController, out: &Renderer) -> Result<(), CliError> {
    let mut events = pin!(controller.events());
    let mut shutdown = pin!(tokio::signal::ctrl_c());

    loop {
        tokio::select! {
            biased;
            result = &mut shutdown => {
                result?;
                break;
            }
            event = events.next() => {
                let Some(event) = event else { break };
                out.print(&out.event(&event)?);
            }
        }
    }
    Ok(())
}
