//! Config subcommand handlers.

use std::fmt::Write as _;

use dialoguer::Input;

use rtmpctl_config::Config;
use rtmpctl_core::DeviceAddress;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::config_path;
use crate::error::{CliError, prompt_err};
use crate::output::Renderer;

// ── Helpers ─────────────────────────────────────────────────────────

fn format_config(cfg: &Config) -> String {
    let s = &cfg.settings;
    let mut out = String::from("[Settings]\n");
    match s.ip.as_deref() {
        Some("") => out.push_str("IP = \"\"  # unset\n"),
        Some(ip) => {
            let _ = writeln!(out, "IP = \"{ip}\"");
        }
        None => {
            let _ = writeln!(out, "# IP not set, defaults to {}", DeviceAddress::LOOPBACK);
        }
    }
    let _ = writeln!(out, "Port = {}", s.port);
    let _ = writeln!(out, "PollIntervalMs = {}", s.poll_interval_ms);
    let _ = write!(out, "TimeoutMs = {}", s.timeout_ms);
    out
}

fn parse_address(input: &str) -> Result<DeviceAddress, CliError> {
    DeviceAddress::parse(input).map_err(|e| CliError::Validation {
        field: "IP".into(),
        reason: e.to_string(),
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts, out: &Renderer) -> Result<(), CliError> {
    let path = config_path(global);

    match args.command {
        ConfigCommand::Show => {
            let cfg = rtmpctl_config::load_config(&path)?;
            out.print(&out.value(&cfg, || format_config(&cfg))?);
            Ok(())
        }

        ConfigCommand::Path => {
            out.print(&path.display().to_string());
            Ok(())
        }

        ConfigCommand::SetAddress { ip } => {
            let address = parse_address(&ip)?;
            rtmpctl_config::save_address(&path, &address)?;
            out.print(&format!("Device address set to {address}"));
            Ok(())
        }

        // ── Init: interactive prompt ────────────────────────────────
        ConfigCommand::Init => {
            eprintln!("rtmpctl configuration");
            eprintln!("   Config path: {}\n", path.display());

            let mut cfg = rtmpctl_config::load_config(&path).unwrap_or_default();
            let current = cfg
                .settings
                .ip
                .clone()
                .filter(|ip| !ip.trim().is_empty())
                .unwrap_or_else(|| "192.168.1.100".into());

            let ip: String = Input::new()
                .with_prompt("Device IP address")
                .default(current)
                .validate_with(|input: &String| -> Result<(), String> {
                    DeviceAddress::parse(input)
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                })
                .interact_text()
                .map_err(prompt_err)?;

            let port: u16 = Input::new()
                .with_prompt("Control port")
                .default(cfg.settings.port)
                .interact_text()
                .map_err(prompt_err)?;

            cfg.set_address(&parse_address(&ip)?);
            cfg.settings.port = port;
            rtmpctl_config::save_config(&path, &cfg)?;

            eprintln!("\n   ✓ Saved to {}", path.display());
            Ok(())
        }
    }
}
