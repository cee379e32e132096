//! Odontograma CLI.

use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use clap::Parser;
use odontograma_core::{ClinicConfig, SqliteStore};
use tracing::level_filters::LevelFilter;

mod cli;
mod commands;
mod logging;

use crate::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use crate::logging::{init_logging, LogConfig, LogFormat};

fn main() {
    let cli = Cli::parse();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }

    let exit_code = match run(&cli) {
        Ok(output) => {
            println!("{output}");
            0
        }
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> Result<String> {
    let store = || -> Result<SqliteStore> {
        let config = ClinicConfig::with_database_path(cli.db.clone())
            .context("resolve database path")?
            .validate_on_save(!cli.no_validate);
        commands::open_store(&config)
    };

    match &cli.command {
        Command::Conditions => Ok(commands::run_conditions()),
        Command::Layout { tipo } => Ok(commands::run_layout(*tipo)),
        Command::Create(args) => commands::run_create(&store()?, args),
        Command::List(args) => commands::run_list(&store()?, &args.patient),
        Command::Show(args) => commands::run_show(&store()?, args),
        Command::Toggle(args) => commands::run_toggle(&store()?, args),
        Command::Note(args) => commands::run_note(&store()?, args),
        Command::Surface(args) => commands::run_surface(&store()?, args),
        Command::Delete(args) => commands::run_delete(&store()?, args),
    }
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.with_ansi = cli.log_file.is_none() && io::stderr().is_terminal();
    config
}
