//! veo-migrate - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Configuration error
//! - 4: Migration failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use veo_core::CoreError;

mod commands;
mod config;

use commands::{migrate::ItemsFailed, Cli, Commands, LogFormat};
use config::{AppConfig, ConfigError};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CONFIG_ERROR: u8 = 3;
    pub const MIGRATION_FAILURE: u8 = 4;
}

fn init_logging(format: LogFormat, verbose: bool) {
    let default = if verbose { "veo=debug,info" } else { "veo=info,warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let text = (format == LogFormat::Text).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });
    let json = (format == LogFormat::Json).then(|| fmt::layer().json().with_writer(std::io::stderr));

    // Already initialized is fine
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.verbose);

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => match cli.config.as_deref().and_then(|path| path.parent()) {
            Some(dir) => config.relative_to(dir),
            None => config,
        },
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            return ExitCode::from(ExitCodes::CONFIG_ERROR);
        }
    };

    let result = match cli.command {
        Commands::Migrate(args) => commands::migrate::execute(args, config).await,
        Commands::Plan(args) => commands::plan::execute(args, config).await,
        Commands::Deregister(args) => commands::deregister::execute(args, config).await,
        Commands::Status(args) => commands::status::execute(args, config).await,
        Commands::Import(args) => commands::import::execute(args, config).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if cause.is::<ConfigError>() {
            return ExitCodes::CONFIG_ERROR;
        }
        if cause.is::<ItemsFailed>() {
            return ExitCodes::MIGRATION_FAILURE;
        }
        if let Some(core) = cause.downcast_ref::<CoreError>() {
            return match core {
                CoreError::InvalidConfig(_) => ExitCodes::CONFIG_ERROR,
                CoreError::NotSupported(_)
                | CoreError::AlreadyRegistered(_)
                | CoreError::ItemNotFound(_)
                | CoreError::RecordNotFound(_)
                | CoreError::InvalidState(_) => ExitCodes::INVALID_ARGS,
                _ => ExitCodes::GENERAL_ERROR,
            };
        }
    }
    ExitCodes::GENERAL_ERROR
}
