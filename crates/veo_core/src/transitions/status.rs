use async_trait::async_trait;
use tracing::debug;

use super::MigrationServices;
use crate::context::MigrationContext;
use crate::events::MigrationEvent;
use crate::machine::Transition;
use crate::record::{ContextId, RecordUpdate};
use crate::state::MigrationStatus;

/// Flags the record as being migrated.
pub struct SetMigratingStatus {
    services: MigrationServices,
}

impl SetMigratingStatus {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Transition<MigrationContext> for SetMigratingStatus {
    fn name(&self) -> &str {
        "set_migrating_status"
    }

    async fn execute(&self, context: &mut MigrationContext) -> bool {
        let record_id = context.record.id;
        match self
            .services
            .provider
            .update_status(record_id, MigrationStatus::Migrating)
            .await
        {
            Ok(()) => {
                context.record.status = MigrationStatus::Migrating;
                true
            }
            Err(e) => {
                self.services.emit(MigrationEvent::UpdatingStatusFailed {
                    record_id,
                    message: e.to_string(),
                });
                false
            }
        }
    }
}

/// Flags the record as migrated and refreshes its descriptive snapshot.
pub struct SetMigratedStatus {
    services: MigrationServices,
}

impl SetMigratedStatus {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Transition<MigrationContext> for SetMigratedStatus {
    fn name(&self) -> &str {
        "set_migrated_status"
    }

    async fn execute(&self, context: &mut MigrationContext) -> bool {
        let record_id = context.record.id;
        let mut update = RecordUpdate::new().status(MigrationStatus::Migrated);

        if let Some(item) = &context.item {
            let mut context_ids: Vec<ContextId> = vec![item.context_id];
            for alias in &context.record.saved_aliases {
                if !context_ids.contains(&alias.context_id) {
                    context_ids.push(alias.context_id);
                }
            }
            update = update.snapshot(item).context_ids(context_ids);
        }

        if let Err(e) = self.services.provider.update_record(record_id, &update).await {
            self.services.emit(MigrationEvent::UpdatingStatusFailed {
                record_id,
                message: e.to_string(),
            });
            return false;
        }

        update.apply(&mut context.record);
        debug!("Record {} flagged as migrated", record_id);
        true
    }
}
