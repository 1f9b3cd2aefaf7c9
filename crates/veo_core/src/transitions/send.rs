use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{original_of, MigrationServices, MISSING_ORIGINAL};
use crate::context::MigrationContext;
use crate::events::MigrationEvent;
use crate::machine::Transition;
use crate::publisher::{UploadMetadata, UploadRequest};
use crate::record::{Item, RecordUpdate};

/// Uploads the original item to the publishing service.
pub struct SendItem {
    services: MigrationServices,
}

impl SendItem {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }

    fn failed(&self, item: &Item, message: impl Into<String>) -> bool {
        self.services.emit(MigrationEvent::SendingItemFailed {
            item_id: Some(item.id),
            message: message.into(),
        });
        false
    }

    /// Title built from the name format of the item's own context.
    async fn title_of(&self, item: &Item) -> Result<String, String> {
        let contexts = self
            .services
            .provider
            .contexts(&[item.context_id])
            .await
            .map_err(|e| e.to_string())?;

        let title = contexts
            .iter()
            .find(|context| context.id == item.context_id)
            .and_then(|context| {
                self.services
                    .config
                    .name_formats
                    .for_kind(context.kind)
                    .map(|format| context.resolve_text(format, &item.filename))
            })
            .unwrap_or_else(|| item.filename.clone());
        Ok(title)
    }
}

#[async_trait]
impl Transition<MigrationContext> for SendItem {
    fn name(&self) -> &str {
        "send_item"
    }

    async fn execute(&self, context: &mut MigrationContext) -> bool {
        let Some(item) = original_of(context) else {
            self.services.emit(MigrationEvent::SendingItemFailed {
                item_id: context.record.item_id,
                message: MISSING_ORIGINAL.to_string(),
            });
            return false;
        };

        let bytes = match self.services.provider.read_content(&item).await {
            Ok(bytes) => bytes,
            Err(e) => return self.failed(&item, e.to_string()),
        };

        let title = match self.title_of(&item).await {
            Ok(title) => title,
            Err(message) => return self.failed(&item, message),
        };

        let user = match &item.owner_email {
            Some(email) => match self.services.publisher.find_user(email).await {
                Ok(user) => user,
                Err(e) => {
                    self.services.client_failure(&e, |message| {
                        MigrationEvent::SendingItemFailed {
                            item_id: Some(item.id),
                            message,
                        }
                    });
                    return false;
                }
            },
            None => None,
        };

        let request = UploadRequest {
            filename: item.filename.clone(),
            mime_type: item.mime_type.clone(),
            bytes,
            metadata: UploadMetadata {
                title,
                date: item.created_at,
                platform: self.services.config.destination_platform.clone(),
                user,
            },
            timeout: self.services.config.upload_timeout(),
        };

        debug!("Uploading item {} ({} bytes)", item.id, request.bytes.len());
        let destination_id = match self.services.publisher.upload(request).await {
            Ok(id) => id,
            Err(e) => {
                self.services.client_failure(&e, |message| MigrationEvent::SendingItemFailed {
                    item_id: Some(item.id),
                    message,
                });
                return false;
            }
        };

        let update = RecordUpdate::new().destination_id(Some(destination_id.clone()));
        if let Err(e) = self
            .services
            .provider
            .update_record(context.record.id, &update)
            .await
        {
            if let Err(delete_error) = self.services.publisher.delete(&destination_id).await {
                warn!(
                    "Uploaded item {} could not be removed: {}",
                    destination_id, delete_error
                );
            }
            return self.failed(&item, e.to_string());
        }

        info!("Item {} uploaded as {}", item.id, destination_id);
        context.record.destination_id = Some(destination_id);
        true
    }
}
