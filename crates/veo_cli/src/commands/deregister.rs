//! Deregister command - Remove registrations that have not started.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use veo_core::{Planner, RecordId};

use crate::config::AppConfig;

#[derive(Args)]
pub struct DeregisterArgs {
    /// Migration record to remove (repeatable)
    #[arg(long = "record", value_name = "ID", required = true)]
    pub records: Vec<u64>,
}

pub async fn execute(args: DeregisterArgs, config: AppConfig) -> Result<()> {
    let store = super::open_library(&config)?;
    let planner = Planner::new(store, Arc::new(config.migration));

    let ids: Vec<RecordId> = args.records.into_iter().map(RecordId::from).collect();
    planner.deregister(&ids).await?;

    println!("✅ Removed {} migration record(s)", ids.len());
    Ok(())
}
