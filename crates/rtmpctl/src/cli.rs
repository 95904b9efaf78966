//! Clap derive structures for the `rtmpctl` CLI.
//!
//! Only depends on `clap` and `clap_complete` so `build.rs` can include it
//! for man page generation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// rtmpctl -- control RTMP streaming on a capture device
#[derive(Debug, Parser)]
#[command(
    name = "rtmpctl",
    version,
    about = "Start, stop and monitor RTMP streaming on a capture device",
    long_about = "Drives the HTTP control interface of an HDMI capture device.\n\n\
        The device address is read from the config file; a one-shot status\n\
        check runs on every invocation before any command is sent.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the config file
    #[arg(long, env = "RTMPCTL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Device IPv4 address for this run (not saved)
    #[arg(long, short = 'd', env = "RTMPCTL_DEVICE", global = true)]
    pub device: Option<String>,

    /// Device control port
    #[arg(long, env = "RTMPCTL_PORT", global = true)]
    pub port: Option<u16>,

    /// Request timeout in milliseconds
    #[arg(long, env = "RTMPCTL_TIMEOUT_MS", global = true)]
    pub timeout_ms: Option<u64>,

    /// Status poll interval in milliseconds
    #[arg(long, env = "RTMPCTL_INTERVAL_MS", global = true)]
    pub interval_ms: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "RTMPCTL_OUTPUT",
        default_value = "text",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines with a status indicator
    Text,
    /// JSON (one document per snapshot or event)
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show whether the device is streaming
    #[command(alias = "st")]
    Status,

    /// Enable RTMP streaming on the device
    Start(StartArgs),

    /// Disable RTMP streaming on the device
    Stop,

    /// Monitor the device and print every state change
    Watch,

    /// Interactive console: start, stop and re-address from stdin
    Console,

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Command Args ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Keep monitoring after the device confirms, until Ctrl-C
    #[arg(long, short = 'w')]
    pub watch: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the current configuration
    Show,

    /// Print the config file path
    Path,

    /// Validate and save the device address
    SetAddress {
        /// IPv4 address, e.g. 192.168.1.10
        ip: String,
    },

    /// Prompt for the device address and write a fresh config file
    Init,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
