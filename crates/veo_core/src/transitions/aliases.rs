use async_trait::async_trait;
use tracing::{debug, warn};

use super::{original_of, MigrationServices, MISSING_ORIGINAL};
use crate::context::MigrationContext;
use crate::events::MigrationEvent;
use crate::machine::Transition;
use crate::record::{Item, ItemId, ItemTemplate, RecordUpdate, ReferenceTarget};

/// Recreate aliases of `original` from their snapshots.
///
/// On failure the aliases created so far are deleted again and the error
/// message is returned.
async fn recreate_aliases(
    services: &MigrationServices,
    original: &Item,
    templates: &[ItemTemplate],
) -> Result<Vec<ItemId>, String> {
    let target = ReferenceTarget::Local {
        item_id: original.id,
    };
    let mut created = Vec::with_capacity(templates.len());

    for template in templates {
        match services.provider.create_reference(template, &target).await {
            Ok(alias) => created.push(alias.id),
            Err(e) => {
                for id in &created {
                    if let Err(delete_error) = services.provider.delete_item(*id).await {
                        warn!("Recreated alias {} could not be removed: {}", id, delete_error);
                    }
                }
                return Err(e.to_string());
            }
        }
    }
    Ok(created)
}

/// Snapshots then deletes every alias of the original item.
pub struct RemoveOriginalAliases {
    services: MigrationServices,
}

impl RemoveOriginalAliases {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }

    fn failed(&self, item_id: Option<ItemId>, message: impl Into<String>) -> bool {
        self.services.emit(MigrationEvent::RemovingOriginalAliasesFailed {
            item_id,
            message: message.into(),
        });
        false
    }
}

#[async_trait]
impl Transition<MigrationContext> for RemoveOriginalAliases {
    fn name(&self) -> &str {
        "remove_original_aliases"
    }

    async fn execute(&self, context: &mut MigrationContext) -> bool {
        let record_id = context.record.id;
        let Some(item) = original_of(context) else {
            return self.failed(context.record.item_id, MISSING_ORIGINAL);
        };

        let aliases = match self.services.provider.aliases(&item).await {
            Ok(aliases) => aliases,
            Err(e) => return self.failed(Some(item.id), e.to_string()),
        };
        let templates: Vec<ItemTemplate> = aliases.iter().map(Item::template).collect();

        let update = RecordUpdate::new().saved_aliases(templates.clone());
        if let Err(e) = self.services.provider.update_record(record_id, &update).await {
            return self.failed(Some(item.id), e.to_string());
        }

        for (index, alias) in aliases.iter().enumerate() {
            if let Err(e) = self.services.provider.delete_item(alias.id).await {
                if let Err(restore_error) =
                    recreate_aliases(&self.services, &item, &templates[..index]).await
                {
                    warn!("Deleted aliases of item {} not recreated: {}", item.id, restore_error);
                }
                let previous =
                    RecordUpdate::new().saved_aliases(context.record.saved_aliases.clone());
                if let Err(update_error) =
                    self.services.provider.update_record(record_id, &previous).await
                {
                    warn!("Alias snapshot of record {} not reset: {}", record_id, update_error);
                }
                return self.failed(Some(item.id), format!("alias {}: {}", alias.id, e));
            }
        }

        debug!("Removed {} aliases of item {}", aliases.len(), item.id);
        context.record.saved_aliases = templates;
        true
    }
}

/// Recreates the saved aliases, pointing at the restored original.
pub struct RestoreOriginalAliases {
    services: MigrationServices,
}

impl RestoreOriginalAliases {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }

    fn failed(&self, item_id: Option<ItemId>, message: impl Into<String>) -> bool {
        self.services.emit(MigrationEvent::RestoringOriginalAliasesFailed {
            item_id,
            message: message.into(),
        });
        false
    }
}

#[async_trait]
impl Transition<MigrationContext> for RestoreOriginalAliases {
    fn name(&self) -> &str {
        "restore_original_aliases"
    }

    async fn execute(&self, context: &mut MigrationContext) -> bool {
        let record_id = context.record.id;
        let Some(item) = original_of(context) else {
            return self.failed(context.record.item_id, MISSING_ORIGINAL);
        };

        let templates = context.record.saved_aliases.clone();
        let created = match recreate_aliases(&self.services, &item, &templates).await {
            Ok(created) => created,
            Err(message) => return self.failed(Some(item.id), message),
        };

        let update = RecordUpdate::new().saved_aliases(Vec::new());
        if let Err(e) = self.services.provider.update_record(record_id, &update).await {
            for id in &created {
                if let Err(delete_error) = self.services.provider.delete_item(*id).await {
                    warn!("Recreated alias {} could not be removed: {}", id, delete_error);
                }
            }
            return self.failed(Some(item.id), e.to_string());
        }

        debug!("Recreated {} aliases of item {}", created.len(), item.id);
        context.record.saved_aliases.clear();
        true
    }
}
