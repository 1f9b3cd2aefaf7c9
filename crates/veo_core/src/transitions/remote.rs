use async_trait::async_trait;
use tracing::{debug, info};

use super::MigrationServices;
use crate::context::MigrationContext;
use crate::events::MigrationEvent;
use crate::machine::Transition;
use crate::publisher::{ClientError, RemoteState};
use crate::record::RecordUpdate;

/// Poll the remote item until the service reports a stable state.
///
/// Returns `None` when a request fails or the attempt cap is reached.
async fn wait_until_stable(
    services: &MigrationServices,
    destination_id: &str,
) -> Option<RemoteState> {
    let interval = services.config.status_polling_interval();
    let max_attempts = services.config.max_poll_attempts;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        match services.publisher.status(destination_id).await {
            Ok(state) if state.is_stable() => {
                debug!("Remote item {} is {} after {} request(s)", destination_id, state, attempts);
                return Some(state);
            }
            Ok(state) => {
                if max_attempts.is_some_and(|max| attempts >= max) {
                    services.emit(MigrationEvent::PollingAttemptsExhausted {
                        destination_id: destination_id.to_string(),
                        attempts,
                    });
                    return None;
                }
                debug!(
                    "Remote item {} is {}, next check in {:?}",
                    destination_id, state, interval
                );
                tokio::time::sleep(interval).await;
            }
            Err(ClientError::Service {
                code,
                module,
                message,
            }) => {
                services.emit(MigrationEvent::GettingRemoteItemFailed {
                    destination_id: destination_id.to_string(),
                    code,
                    module,
                    message,
                });
                return None;
            }
            Err(e) => {
                services.client_failure(&e, |message| MigrationEvent::GettingRemoteItemFailed {
                    destination_id: destination_id.to_string(),
                    code: -1,
                    module: "client".to_string(),
                    message,
                });
                return None;
            }
        }
    }
}

/// Waits until the service has finished processing the uploaded item.
pub struct WaitForRemoteItem {
    services: MigrationServices,
}

impl WaitForRemoteItem {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Transition<MigrationContext> for WaitForRemoteItem {
    fn name(&self) -> &str {
        "wait_for_remote_item"
    }

    async fn execute(&self, context: &mut MigrationContext) -> bool {
        let Some(destination_id) = self.services.destination_of(context, self.name()) else {
            return false;
        };

        match wait_until_stable(&self.services, &destination_id).await {
            Some(state) if state.is_available() => true,
            Some(state) => {
                self.services.emit(MigrationEvent::WaitingForRemoteItemFailed {
                    destination_id,
                    state: state.code(),
                });
                false
            }
            None => false,
        }
    }
}

/// Publishes the remote item.
pub struct PublishRemoteItem {
    services: MigrationServices,
}

impl PublishRemoteItem {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Transition<MigrationContext> for PublishRemoteItem {
    fn name(&self) -> &str {
        "publish_remote_item"
    }

    async fn execute(&self, context: &mut MigrationContext) -> bool {
        let Some(destination_id) = self.services.destination_of(context, self.name()) else {
            return false;
        };

        match self.services.publisher.publish(&destination_id).await {
            Ok(()) => {
                info!("Remote item {} published", destination_id);
                true
            }
            Err(e) => {
                self.services.client_failure(&e, |message| {
                    MigrationEvent::PublishingRemoteItemFailed {
                        destination_id: destination_id.clone(),
                        message,
                    }
                });
                false
            }
        }
    }
}

/// Deletes the uploaded copy once the service is done with it.
pub struct RemoveRemoteItem {
    services: MigrationServices,
}

impl RemoveRemoteItem {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Transition<MigrationContext> for RemoveRemoteItem {
    fn name(&self) -> &str {
        "remove_remote_item"
    }

    async fn execute(&self, context: &mut MigrationContext) -> bool {
        let Some(destination_id) = self.services.destination_of(context, self.name()) else {
            return false;
        };

        // Only items in a stable state can be deleted.
        if wait_until_stable(&self.services, &destination_id).await.is_none() {
            return false;
        }

        if let Err(e) = self.services.publisher.delete(&destination_id).await {
            self.services.client_failure(&e, |message| MigrationEvent::RemovingRemoteItemFailed {
                destination_id: destination_id.clone(),
                message,
            });
            return false;
        }

        let update = RecordUpdate::new().destination_id(None);
        if let Err(e) = self
            .services
            .provider
            .update_record(context.record.id, &update)
            .await
        {
            self.services.emit(MigrationEvent::RemovingRemoteItemFailed {
                destination_id,
                message: e.to_string(),
            });
            return false;
        }

        info!("Remote item {} removed", destination_id);
        context.record.destination_id = None;
        true
    }
}
