//! Status command - List migration records.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use veo_core::{ItemId, MigrationStatus, Planner};

use crate::config::AppConfig;

#[derive(Args)]
pub struct StatusArgs {
    /// Only list records with this status
    #[arg(long, value_parser = super::parse_status)]
    status: Option<MigrationStatus>,

    /// Show the status of a single item instead
    #[arg(long, value_name = "ID", conflicts_with = "status")]
    item: Option<u64>,

    /// Print records as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: StatusArgs, config: AppConfig) -> Result<()> {
    let store = super::open_library(&config)?;
    let planner = Planner::new(store, Arc::new(config.migration));

    if let Some(id) = args.item {
        let status = planner.status_of(ItemId(id)).await?;
        if args.json {
            println!("{}", serde_json::json!({ "item_id": id, "status": status }));
        } else {
            println!("Item {}: {}", id, status);
        }
        return Ok(());
    }

    let records = planner.records(args.status).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        super::print_records(&records);
    }
    Ok(())
}
