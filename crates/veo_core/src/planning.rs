//! Registration of items for migration.

use std::sync::Arc;

use tracing::info;

use crate::config::MigrationConfig;
use crate::error::{CoreError, CoreResult};
use crate::provider::ItemProvider;
use crate::record::{Item, ItemId, MigrationRecord, RecordId};
use crate::state::{MigrationState, MigrationStatus};

/// Check an item can be migrated at all.
pub fn check_supported(item: &Item, config: &MigrationConfig) -> CoreResult<()> {
    if item.is_reference() {
        return Err(CoreError::NotSupported(format!(
            "item {} is a reference to another item",
            item.id
        )));
    }
    if item.field.is_draft() {
        return Err(CoreError::NotSupported(format!("item {} is a draft", item.id)));
    }
    if !config.accepts(&item.mime_type) {
        return Err(CoreError::NotSupported(format!(
            "item {} has MIME type {} which is not accepted",
            item.id, item.mime_type
        )));
    }
    Ok(())
}

/// Plans, deregisters and reports on items.
pub struct Planner {
    provider: Arc<dyn ItemProvider>,
    config: Arc<MigrationConfig>,
}

impl Planner {
    pub fn new(provider: Arc<dyn ItemProvider>, config: Arc<MigrationConfig>) -> Self {
        Self { provider, config }
    }

    /// Register items for migration.
    ///
    /// Every item is checked before any is registered: one unsupported or
    /// already registered item rejects the whole batch.
    pub async fn plan(&self, item_ids: &[ItemId]) -> CoreResult<Vec<MigrationRecord>> {
        let mut items = Vec::with_capacity(item_ids.len());
        for id in item_ids {
            let item = self.provider.item(*id).await?;
            check_supported(&item, &self.config)?;
            if self.provider.record_for_item(item.id).await?.is_some() {
                return Err(CoreError::AlreadyRegistered(item.id));
            }
            items.push(item);
        }

        let mut records = Vec::with_capacity(items.len());
        for item in &items {
            let record = self.provider.plan(item).await?;
            info!("Planned item {} ({}) as record {}", item.id, item.filename, record.id);
            records.push(record);
        }
        Ok(records)
    }

    /// Remove records whose migration has not started.
    pub async fn deregister(&self, record_ids: &[RecordId]) -> CoreResult<()> {
        for id in record_ids {
            let record = self.provider.record(*id).await?;
            if record.state != MigrationState::NotInitialized {
                return Err(CoreError::InvalidState(format!(
                    "record {} is at state {}, only records not yet started can be removed",
                    record.id, record.state
                )));
            }
        }
        self.provider.delete_records(record_ids).await?;
        info!("Removed {} migration records", record_ids.len());
        Ok(())
    }

    /// Effective migration status of an item.
    pub async fn status_of(&self, item_id: ItemId) -> CoreResult<MigrationStatus> {
        if let Some(record) = self.provider.record_for_item(item_id).await? {
            return Ok(record.effective_status());
        }
        let item = self.provider.item(item_id).await?;
        match check_supported(&item, &self.config) {
            Ok(()) => Ok(MigrationStatus::Unregistered),
            Err(CoreError::NotSupported(_)) => Ok(MigrationStatus::NotSupported),
            Err(e) => Err(e),
        }
    }

    /// Records matching a listing filter, or all of them.
    pub async fn records(&self, filter: Option<MigrationStatus>) -> CoreResult<Vec<MigrationRecord>> {
        self.provider.records(filter).await
    }
}
