// ABOUTME: Entry point for the lakeship CLI application.
// ABOUTME: Parses arguments, sets up tracing and signal handling, and dispatches commands.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{DeployRequest, RollbackRequest};
use lakeship::config::Config;
use lakeship::deploy::{DeployErrorKind, DeployFlags};
use lakeship::error::{Error, Result};
use lakeship::exec::SystemRunner;
use lakeship::interrupt::Interrupt;
use lakeship::output::{Output, OutputMode};
use lakeship::tools::Toolchain;
use std::env;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "LAKESHIP_LOG";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // LAKESHIP_LOG wins over the verbose flag
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    let interrupt = Interrupt::new();
    let listener = interrupt.listen_for_signals();

    let result = run(cli, mode, &interrupt).await;
    listener.abort();

    if let Err(e) = result {
        report_error(&e, Output::new(mode));
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, mode: OutputMode, interrupt: &Interrupt) -> Result<()> {
    let root = match cli.project_dir {
        Some(dir) => dir,
        None => env::current_dir()?,
    };
    let config = match cli.config {
        Some(ref path) => Config::load(path)?,
        None => Config::discover(&root)?,
    };
    let runner = SystemRunner;
    let tc = Toolchain::new(&runner, &config, &root, interrupt);
    let output = Output::new(mode);
    let stdin = std::io::BufReader::new(std::io::stdin());

    match cli.command {
        Commands::Deploy {
            environment,
            skip_tests,
            force,
            dry_run,
            no_build,
            tag,
        } => {
            let request = DeployRequest {
                environment,
                tag,
                flags: DeployFlags {
                    skip_tests,
                    force,
                    dry_run,
                    build_images: !no_build,
                },
            };
            commands::deploy(request, &tc, output, stdin).await
        }
        Commands::Rollback {
            environment,
            previous_version,
            yes,
        } => {
            let request = RollbackRequest {
                environment,
                version: previous_version,
                yes,
            };
            commands::rollback(request, &tc, output, stdin).await
        }
    }
}

/// Single place where fatal errors become user-facing messages.
fn report_error(error: &Error, output: Output) {
    if error.is_cancellation() {
        output.cancelled(&error.to_string());
        return;
    }

    output.error(&error.to_string());
    if let Error::Deploy(e) = error
        && e.kind() == DeployErrorKind::Interrupted
    {
        output.error(
            "the environment may be in an inconsistent state; \
             restore a known version with `lakeship rollback <environment> <version>`",
        );
    }
}
