mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use tracing::error;

use appgate_core::config::{load_dotenv, Config};

use crate::cli::{CliArgs, Command};

fn main() {
    if let Err(e) = run() {
        error!(error = %e, "appgate failed");
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();

    // Logs go to stderr; stdout carries the command output.
    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    load_dotenv();
    let config = Config::from_env();
    config.log_summary();

    match &args.command {
        Command::Check(check) => commands::check(check, &config),
        Command::DumpSha(dump) => commands::dump_sha(dump, &config),
        Command::DiffSha(diff) => commands::diff_sha(diff, &config),
    }
}
