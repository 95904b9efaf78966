//! `rtmpctl console`: line-oriented stand-in for a control panel.
//!
//! Reads intents from stdin while events and phase changes print as they
//! happen. Failed intents are reported and the console keeps running.

use std::pin::pin;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;

use rtmpctl_core::StreamController;

use crate::error::CliError;
use crate::output::Renderer;

const HELP: &str = "commands: start | stop | address <ip> | status | help | quit";

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Start,
    Stop,
    Address(&'a str),
    Status,
    Help,
    Quit,
    Empty,
    Unknown(&'a str),
}

fn parse_line(line: &str) -> Line<'_> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Line::Empty;
    };
    match (verb.to_ascii_lowercase().as_str(), words.next()) {
        ("start", None) => Line::Start,
        ("stop", None) => Line::Stop,
        ("address" | "ip", Some(ip)) => Line::Address(ip),
        ("status", None) => Line::Status,
        ("help" | "?", None) => Line::Help,
        ("quit" | "exit" | "q", None) => Line::Quit,
        _ => Line::Unknown(line.trim()),
    }
}

pub async fn handle(controller: &StreamController, out: &Renderer) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut events = pin!(controller.events());
    let mut state = controller.state();
    let mut shutdown = pin!(tokio::signal::ctrl_c());

    eprintln!("{HELP}");

    // Input is ignored until the startup probe settles.
    let snap = controller.settled().await?;
    let mut last_phase = Some(snap.phase);
    out.print(&out.snapshot(&snap)?);

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
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = state.borrow_and_update().clone();
                if last_phase != Some(snap.phase) && !snap.probing {
                    last_phase = Some(snap.phase);
                    out.print(&out.snapshot(&snap)?);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let result = match parse_line(&line) {
                    Line::Start => controller.request_start().await,
                    Line::Stop => controller.request_stop().await,
                    Line::Address(ip) => controller.set_address(ip).await.map(|_| ()),
                    Line::Status => {
                        out.print(&out.snapshot(&controller.snapshot())?);
                        Ok(())
                    }
                    Line::Help => {
                        eprintln!("{HELP}");
                        Ok(())
                    }
                    Line::Quit => break,
                    Line::Empty => Ok(()),
                    Line::Unknown(other) => {
                        eprintln!("unknown command '{other}'; {HELP}");
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    eprintln!("{:?}", miette::Report::new(CliError::from(e)));
                }
            }
        }
    }
    Ok(())
}
