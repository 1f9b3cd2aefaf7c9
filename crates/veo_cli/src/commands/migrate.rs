//! Migrate command - Run the migration driver.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use thiserror::Error;
use tracing::{error, info};

use veo_client::HttpPublisher;
use veo_core::{
    EventSink, JsonLinesSink, MigrationReport, MigrationServices, Migrator, MultiSink, TracingSink,
};

use crate::config::AppConfig;

/// Reported when a pass leaves items unmigrated.
#[derive(Error, Debug)]
#[error("{failed} of {total} item(s) failed to migrate")]
pub struct ItemsFailed {
    pub failed: usize,
    pub total: usize,
}

#[derive(Args)]
pub struct MigrateArgs {
    /// Also migrate unregistered items of the configured file fields
    #[arg(long)]
    automatic: bool,

    /// Keep running, starting a pass every SECS seconds
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Append lifecycle events to this JSON lines file
    #[arg(long, value_name = "PATH")]
    event_log: Option<PathBuf>,
}

pub async fn execute(args: MigrateArgs, mut config: AppConfig) -> Result<()> {
    if args.automatic {
        config.migration.automatic_migration = true;
    }
    config.migration.validate()?;

    let publisher = HttpPublisher::new(config.service()?.clone())
        .context("Failed to create publishing service client")?;
    let store = super::open_library(&config)?;

    let mut sinks = MultiSink::new().with(Arc::new(TracingSink));
    if let Some(path) = &args.event_log {
        let log = JsonLinesSink::open(path)
            .with_context(|| format!("Failed to open event log {}", path.display()))?;
        sinks = sinks.with(Arc::new(log));
    }
    let events: Arc<dyn EventSink> = Arc::new(sinks);

    let services = MigrationServices::new(store, Arc::new(publisher), events, config.migration);
    let migrator = Migrator::new(services);

    let Some(interval) = args.interval else {
        let report = migrator.run_pending().await?;
        print_report(&report);
        return check_report(&report);
    };

    info!("Starting a migration pass every {} seconds", interval);
    loop {
        run_pass(&migrator).await;

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                return Ok(());
            }
        }
    }
}

/// One pass of the interval loop; a failed pass is logged and the next one
/// still runs.
async fn run_pass(migrator: &Migrator) -> Option<MigrationReport> {
    match migrator.run_pending().await {
        Ok(report) => {
            if !report.is_empty() {
                print_report(&report);
            }
            Some(report)
        }
        Err(e) => {
            error!("Migration pass failed: {}", e);
            None
        }
    }
}

fn check_report(report: &MigrationReport) -> Result<()> {
    let failed = report.failed().count();
    if failed > 0 {
        return Err(ItemsFailed {
            failed,
            total: report.len(),
        }
        .into());
    }
    Ok(())
}

fn print_report(report: &MigrationReport) {
    if report.is_empty() {
        println!("Nothing to migrate.");
        return;
    }

    for outcome in &report.outcomes {
        let mark = if outcome.success { "✅" } else { "❌" };
        println!(
            "{} {} (record {}): {} at {}",
            mark, outcome.filename, outcome.record_id, outcome.status, outcome.state
        );
    }

    let blocked = report.blocked().count();
    println!();
    println!(
        "{} migrated, {} failed",
        report.migrated().count(),
        report.failed().count()
    );
    if blocked > 0 {
        println!(
            "⚠️  {} item(s) blocked: rollback failed, manual intervention required",
            blocked
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veo_client::MockPublisher;
    use veo_core::{
        ContextId, FileField, ItemId, ItemOutcome, ItemProvider, ItemTemplate, MigrationConfig,
        MigrationState, MigrationStatus, RecordId, RecordingSink,
    };
    use veo_store::{LibraryStore, StoreOp};

    fn outcome(success: bool, status: MigrationStatus) -> ItemOutcome {
        ItemOutcome {
            record_id: RecordId(1),
            item_id: Some(ItemId(2)),
            filename: "intro.mp4".to_string(),
            state: MigrationState::NotInitialized,
            status,
            success,
        }
    }

    fn migrator(config: MigrationConfig) -> (Migrator, Arc<LibraryStore>) {
        let store = Arc::new(LibraryStore::in_memory());
        let services = MigrationServices::new(
            store.clone(),
            Arc::new(MockPublisher::new()),
            Arc::new(RecordingSink::default()),
            config,
        );
        (Migrator::new(services), store)
    }

    #[tokio::test]
    async fn test_failed_pass_does_not_stop_interval_loop() {
        let (migrator, _) = migrator(MigrationConfig::new(""));
        assert!(run_pass(&migrator).await.is_none());
        assert!(run_pass(&migrator).await.is_none());
    }

    #[tokio::test]
    async fn test_interval_pass_reports_items() {
        let (migrator, store) = migrator(MigrationConfig::default());
        let template = ItemTemplate {
            filename: "intro.mp4".to_string(),
            mime_type: "video/mp4".to_string(),
            created_at: chrono::Utc::now(),
            context_id: ContextId(1),
            field: FileField::new("mod_resource", "content"),
            owner_email: None,
        };
        let item = store.add_item(&template, b"frames").unwrap();
        store.plan(&item).await.unwrap();
        store.fail_after(StoreOp::NextByStatus, 2);

        let report = run_pass(&migrator).await.unwrap();
        assert_eq!(report.len(), 1);
        assert!(report.all_migrated());
    }

    #[test]
    fn test_check_report() {
        let mut report = MigrationReport::default();
        assert!(check_report(&report).is_ok());

        report.outcomes.push(outcome(true, MigrationStatus::Migrated));
        assert!(check_report(&report).is_ok());

        report.outcomes.push(outcome(false, MigrationStatus::Error));
        let err = check_report(&report).unwrap_err();
        let failed = err.downcast_ref::<ItemsFailed>().unwrap();
        assert_eq!((failed.failed, failed.total), (1, 2));
    }
}
