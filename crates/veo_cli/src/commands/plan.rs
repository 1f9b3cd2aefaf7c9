//! Plan command - Register items for migration.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use veo_core::{ItemId, Planner};

use crate::config::AppConfig;

#[derive(Args)]
pub struct PlanArgs {
    /// Item to register (repeatable)
    #[arg(long = "item", value_name = "ID", required = true)]
    pub items: Vec<u64>,
}

pub async fn execute(args: PlanArgs, config: AppConfig) -> Result<()> {
    let store = super::open_library(&config)?;
    let planner = Planner::new(store, Arc::new(config.migration));

    let ids: Vec<ItemId> = args.items.into_iter().map(ItemId::from).collect();
    let records = planner.plan(&ids).await?;

    println!("✅ Registered {} item(s) for migration", records.len());
    super::print_records(&records);
    Ok(())
}
