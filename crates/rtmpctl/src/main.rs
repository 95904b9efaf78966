mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;
use crate::output::Renderer;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    install_logging(&cli.global);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = u8::try_from(err.exit_code()).unwrap_or(1);
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code)
        }
    }
}

/// Diagnostics go to stderr so stdout stays parseable with `--output json`.
fn install_logging(global: &GlobalOpts) {
    let level = match (global.quiet, global.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;
    let out = Renderer::new(&global);

    match command {
        Command::Config(args) => commands::config_cmd::handle(args, &global, &out),
        Command::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "rtmpctl",
                &mut std::io::stdout(),
            );
            Ok(())
        }
        device_command => {
            // Building the controller starts the status probe right away.
            let controller = config::build_controller(&global)?;
            tracing::debug!(command = ?device_command, "running device command");
            let result = commands::dispatch(device_command, &controller, &out).await;
            controller.shutdown().await;
            result
        }
    }
}
