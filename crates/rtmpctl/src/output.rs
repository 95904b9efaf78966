//! Output formatting: text lines with a status indicator, or JSON.
//!
//! The indicator mirrors a front-panel LED: green while streaming, red when
//! stopped, yellow when the device cannot be reached, grey while unknown.

use std::fmt::Write as _;
use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;

use rtmpctl_core::{ControllerEvent, ControllerSnapshot, ObservedState};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};

const DOT: &str = "●";

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Rendering settings resolved once from the global flags.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    format: OutputFormat,
    color: bool,
    quiet: bool,
}

impl Renderer {
    pub fn new(global: &GlobalOpts) -> Self {
        Self {
            format: global.output,
            color: should_color(global.color),
            quiet: global.quiet,
        }
    }

    pub fn snapshot(&self, snap: &ControllerSnapshot) -> Result<String, serde_json::Error> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(snap),
            OutputFormat::Text => Ok(self.snapshot_line(snap)),
        }
    }

    /// Events render as one line each; JSON output is newline-delimited.
    pub fn event(&self, event: &ControllerEvent) -> Result<String, serde_json::Error> {
        match self.format {
            OutputFormat::Json => serde_json::to_string(event),
            OutputFormat::Text => Ok(self.event_line(event)),
        }
    }

    /// Arbitrary serializable value; `text` builds the human form.
    pub fn value<T: Serialize>(
        &self,
        value: &T,
        text: impl FnOnce() -> String,
    ) -> Result<String, serde_json::Error> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(value),
            OutputFormat::Text => Ok(text()),
        }
    }

    /// Print to stdout, respecting quiet mode.
    pub fn print(&self, output: &str) {
        if self.quiet || output.is_empty() {
            return;
        }
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{output}");
    }

    fn snapshot_line(&self, snap: &ControllerSnapshot) -> String {
        let mut out = format!("{} {}", self.indicator(snap.observed), snap.observed);
        let _ = write!(out, "  phase={}", snap.phase);
        match snap.address {
            Some(address) => {
                let _ = write!(out, "  device={address}:{}", address.port());
            }
            None => out.push_str("  device=(unset)"),
        }
        if snap.probing {
            out.push_str("  (checking)");
        }
        if let Some(ref error) = snap.last_error {
            let _ = write!(out, "\n  error: {error}");
        }
        out
    }

    fn event_line(&self, event: &ControllerEvent) -> String {
        match event {
            ControllerEvent::StateChanged(change) => format!(
                "{} {} ({})",
                self.indicator(change.observed),
                change.observed,
                change.reason
            ),
            ControllerEvent::ConnectionError { message, reason } => {
                let label = if self.color {
                    "connection error".red().bold().to_string()
                } else {
                    "connection error".to_owned()
                };
                let dot = self.indicator(ObservedState::Unreachable);
                format!("{dot} {label} ({reason}): {message}")
            }
        }
    }

    fn indicator(&self, observed: ObservedState) -> String {
        if !self.color {
            return DOT.to_owned();
        }
        match observed {
            ObservedState::Streaming => DOT.green().to_string(),
            ObservedState::Stopped => DOT.red().to_string(),
            ObservedState::Unreachable => DOT.yellow().to_string(),
            ObservedState::Unknown => DOT.dimmed().to_string(),
        }
    }
}
