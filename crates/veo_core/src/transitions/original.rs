use async_trait::async_trait;
use tracing::{debug, info};

use super::{original_of, MigrationServices, MISSING_ORIGINAL};
use crate::context::MigrationContext;
use crate::events::MigrationEvent;
use crate::machine::Transition;
use crate::record::RecordUpdate;

/// Checks the original item is still there, unchanged.
pub struct VerifyOriginal {
    services: MigrationServices,
}

impl VerifyOriginal {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }

    fn failed(&self, context: &MigrationContext, message: impl Into<String>) -> bool {
        self.services.emit(MigrationEvent::VerifyingOriginalFailed {
            item_id: context.record.item_id,
            message: message.into(),
        });
        false
    }
}

#[async_trait]
impl Transition<MigrationContext> for VerifyOriginal {
    fn name(&self) -> &str {
        "verify_original"
    }

    async fn execute(&self, context: &mut MigrationContext) -> bool {
        let Some(expected) = original_of(context) else {
            return self.failed(context, MISSING_ORIGINAL);
        };

        let current = match self.services.provider.item(expected.id).await {
            Ok(item) => item,
            Err(e) => return self.failed(context, e.to_string()),
        };

        if current.content_hash != expected.content_hash {
            return self.failed(
                context,
                format!("content of item {} changed during migration", expected.id),
            );
        }

        context.item = Some(current);
        true
    }
}

/// Deletes the original item. The item goes to the trash.
pub struct RemoveOriginal {
    services: MigrationServices,
}

impl RemoveOriginal {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Transition<MigrationContext> for RemoveOriginal {
    fn name(&self) -> &str {
        "remove_original"
    }

    async fn execute(&self, context: &mut MigrationContext) -> bool {
        let Some(item) = original_of(context) else {
            self.services.emit(MigrationEvent::RemovingOriginalFailed {
                item_id: context.record.item_id,
                message: MISSING_ORIGINAL.to_string(),
            });
            return false;
        };

        match self.services.provider.delete_item(item.id).await {
            Ok(()) => {
                info!("Original item {} removed", item.id);
                true
            }
            Err(e) => {
                self.services.emit(MigrationEvent::RemovingOriginalFailed {
                    item_id: Some(item.id),
                    message: e.to_string(),
                });
                false
            }
        }
    }
}

/// Deletes draft copies sharing the original's content.
pub struct RemoveOriginalDraftFiles {
    services: MigrationServices,
}

impl RemoveOriginalDraftFiles {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Transition<MigrationContext> for RemoveOriginalDraftFiles {
    fn name(&self) -> &str {
        "remove_original_draft_files"
    }

    async fn execute(&self, context: &mut MigrationContext) -> bool {
        let Some(item) = original_of(context) else {
            self.services.emit(MigrationEvent::RemovingDraftFilesFailed {
                item_id: context.record.item_id,
                message: MISSING_ORIGINAL.to_string(),
            });
            return false;
        };

        match self.services.provider.delete_draft_copies(&item).await {
            Ok(count) => {
                debug!("Removed {} draft copies of item {}", count, item.id);
                true
            }
            Err(e) => {
                self.services.emit(MigrationEvent::RemovingDraftFilesFailed {
                    item_id: Some(item.id),
                    message: e.to_string(),
                });
                false
            }
        }
    }
}

/// Brings the original back from the trash and points the record at it.
pub struct RestoreOriginal {
    services: MigrationServices,
}

impl RestoreOriginal {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Transition<MigrationContext> for RestoreOriginal {
    fn name(&self) -> &str {
        "restore_original"
    }

    async fn execute(&self, context: &mut MigrationContext) -> bool {
        let record_id = context.record.id;
        let Some(item) = original_of(context) else {
            self.services.emit(MigrationEvent::RestoringOriginalFailed {
                item_id: context.record.item_id,
                message: MISSING_ORIGINAL.to_string(),
            });
            return false;
        };

        let restored = match self.services.provider.restore_from_trash(&item).await {
            Ok(restored) => restored,
            Err(e) => {
                self.services.emit(MigrationEvent::RestoringOriginalFailed {
                    item_id: Some(item.id),
                    message: e.to_string(),
                });
                return false;
            }
        };

        let update = RecordUpdate::new().item_id(Some(restored.id));
        if let Err(e) = self.services.provider.update_record(record_id, &update).await {
            self.services.emit(MigrationEvent::UpdatingRecordItemIdFailed {
                record_id,
                item_id: restored.id,
                message: e.to_string(),
            });
            return false;
        }

        info!("Original item {} restored as {}", item.id, restored.id);
        context.record.item_id = Some(restored.id);
        context.item = Some(restored);
        true
    }
}
