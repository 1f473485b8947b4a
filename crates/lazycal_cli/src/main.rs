//! lazycal command-line entry point.
//!
//! # Responsibility
//! - Load configuration, initialize logging and open the database.
//! - Dispatch one subcommand and map its outcome to a process exit code.

mod cli;
mod commands;
mod config;
mod error;

use std::process::ExitCode;

use clap::Parser;
use lazycal_core::{default_log_level, init_logging, open_db};

use crate::cli::Cli;
use crate::config::CliConfig;
use crate::error::CliResult;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_failed module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: &Cli) -> CliResult<()> {
    let config = CliConfig::load(cli.config.as_deref())?;

    if let Some(log_dir) = &config.logging.log_dir {
        let level = config.logging.level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &log_dir.to_string_lossy())?;
    }

    let database = cli.database.clone().unwrap_or_else(|| config.database_path());
    if let Some(parent) = database.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = open_db(&database)?;
    log::info!(
        "event=cli_start module=cli status=ok db={}",
        database.display()
    );

    let stdout = std::io::stdout();
    commands::execute(&cli.command, &conn, &config.engine, &mut stdout.lock())
}
