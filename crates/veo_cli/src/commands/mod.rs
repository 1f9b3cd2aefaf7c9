//! CLI command definitions.
//!
//! Each subcommand maps to one operation of the migration service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use veo_core::{MigrationRecord, MigrationStatus};
use veo_store::LibraryStore;

use crate::config::AppConfig;

pub mod deregister;
pub mod import;
pub mod migrate;
pub mod plan;
pub mod status;

/// veo-migrate - move media items to an OpenVeo publishing service
#[derive(Parser)]
#[command(name = "veo-migrate")]
#[command(version, about = "veo-migrate - move media items to an OpenVeo publishing service")]
#[command(long_about = r#"
veo-migrate moves media items from a local library to an OpenVeo publishing
service, one item at a time. Every migration runs through a fixed sequence of
steps and is rolled back if any step fails.

COMMANDS:
  import      → Add a media file to the library
  plan        → Register items for migration
  deregister  → Remove registrations that have not started
  status      → List migration records
  migrate     → Migrate registered items

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Configuration error
  4 - At least one item failed to migrate
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, env = "VEO_MIGRATION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Migrate registered items
    Migrate(migrate::MigrateArgs),

    /// Register items for migration
    Plan(plan::PlanArgs),

    /// Remove registrations that have not started
    Deregister(deregister::DeregisterArgs),

    /// List migration records
    Status(status::StatusArgs),

    /// Add a media file to the library
    Import(import::ImportArgs),
}

/// Open the item library named by the configuration.
pub fn open_library(config: &AppConfig) -> Result<Arc<LibraryStore>> {
    let store = LibraryStore::open(&config.library)
        .with_context(|| format!("Failed to open library {}", config.library.display()))?;
    Ok(Arc::new(store))
}

/// Parse a status name given on the command line.
pub fn parse_status(value: &str) -> Result<MigrationStatus, String> {
    MigrationStatus::from_str(value).ok_or_else(|| {
        format!(
            "unknown status '{}' (expected planned, migrating, migrated, error or blocked)",
            value
        )
    })
}

/// One line per record.
pub fn print_records(records: &[MigrationRecord]) {
    if records.is_empty() {
        println!("No migration records.");
        return;
    }

    println!(
        "{:>6}  {:>6}  {:<12}  {:<28}  {:<16}  {}",
        "RECORD", "ITEM", "STATUS", "STATE", "DESTINATION", "FILE"
    );
    for record in records {
        println!(
            "{:>6}  {:>6}  {:<12}  {:<28}  {:<16}  {}",
            record.id,
            record
                .item_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.effective_status().as_str(),
            record.state.as_str(),
            record.destination_id.as_deref().unwrap_or("-"),
            record.filename
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("blocked"), Ok(MigrationStatus::Blocked));
        assert!(parse_status("finished").is_err());
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from([
            "veo-migrate",
            "--log-format",
            "json",
            "plan",
            "--item",
            "4",
            "--item",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Plan(args) => assert_eq!(args.items, vec![4, 7]),
            _ => panic!("expected plan"),
        }

        assert!(Cli::try_parse_from(["veo-migrate", "plan"]).is_err());
        assert!(Cli::try_parse_from(["veo-migrate", "status", "--status", "done"]).is_err());
    }
}
