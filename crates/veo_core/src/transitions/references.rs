use async_trait::async_trait;
use tracing::{debug, warn};

use super::{original_of, MigrationServices, MISSING_ORIGINAL};
use crate::context::MigrationContext;
use crate::error::CoreError;
use crate::events::MigrationEvent;
use crate::machine::Transition;
use crate::record::{ItemId, RecordUpdate, ReferenceTarget};

/// Creates references to the remote item in place of the original and of
/// each of its former aliases.
pub struct CreateNewReferences {
    services: MigrationServices,
}

impl CreateNewReferences {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }

    async fn discard(&self, ids: &[ItemId]) {
        for id in ids {
            if let Err(e) = self.services.provider.delete_item(*id).await {
                warn!("New reference {} could not be removed: {}", id, e);
            }
        }
    }
}

#[async_trait]
impl Transition<MigrationContext> for CreateNewReferences {
    fn name(&self) -> &str {
        "create_new_references"
    }

    async fn execute(&self, context: &mut MigrationContext) -> bool {
        let Some(destination_id) = self.services.destination_of(context, self.name()) else {
            return false;
        };
        let Some(item) = original_of(context) else {
            self.services.emit(MigrationEvent::CreatingReferenceFailed {
                destination_id,
                message: MISSING_ORIGINAL.to_string(),
            });
            return false;
        };

        let target = ReferenceTarget::External {
            destination_id: destination_id.clone(),
        };
        let mut templates = vec![item.template()];
        templates.extend(context.record.saved_aliases.iter().cloned());

        let mut created = Vec::with_capacity(templates.len());
        for template in &templates {
            match self.services.provider.create_reference(template, &target).await {
                Ok(reference) => created.push(reference.id),
                Err(e) => {
                    self.discard(&created).await;
                    self.services.emit(MigrationEvent::CreatingReferenceFailed {
                        destination_id,
                        message: e.to_string(),
                    });
                    return false;
                }
            }
        }

        let update = RecordUpdate::new().new_reference_ids(created.clone());
        if let Err(e) = self
            .services
            .provider
            .update_record(context.record.id, &update)
            .await
        {
            self.discard(&created).await;
            self.services.emit(MigrationEvent::CreatingReferenceFailed {
                destination_id,
                message: e.to_string(),
            });
            return false;
        }

        debug!("Created {} references to {}", created.len(), destination_id);
        context.record.new_reference_ids = created;
        true
    }
}

/// Deletes the references created by [`CreateNewReferences`].
pub struct RemoveNewReferences {
    services: MigrationServices,
}

impl RemoveNewReferences {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Transition<MigrationContext> for RemoveNewReferences {
    fn name(&self) -> &str {
        "remove_new_references"
    }

    async fn execute(&self, context: &mut MigrationContext) -> bool {
        for id in &context.record.new_reference_ids {
            match self.services.provider.delete_item(*id).await {
                // Already gone: a previous attempt got this far.
                Ok(()) | Err(CoreError::ItemNotFound(_)) => {}
                Err(e) => {
                    self.services.emit(MigrationEvent::RemovingReferencesFailed {
                        record_id: context.record.id,
                        item_id: Some(*id),
                        message: e.to_string(),
                    });
                    return false;
                }
            }
        }

        let update = RecordUpdate::new().new_reference_ids(Vec::new());
        if let Err(e) = self
            .services
            .provider
            .update_record(context.record.id, &update)
            .await
        {
            self.services.emit(MigrationEvent::RemovingReferencesFailed {
                record_id: context.record.id,
                item_id: None,
                message: e.to_string(),
            });
            return false;
        }

        context.record.new_reference_ids.clear();
        true
    }
}
