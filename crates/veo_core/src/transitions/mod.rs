//! Migration steps.
//!
//! Each step is a [`Transition`] over a [`MigrationContext`]. Steps absorb
//! every provider and client error: a failure is reported through a named
//! event and the step returns `false`.
//!
//! [`Transition`]: crate::machine::Transition

mod aliases;
mod original;
mod references;
mod remote;
mod send;
mod status;

use std::sync::Arc;

use crate::config::MigrationConfig;
use crate::context::MigrationContext;
use crate::events::{EventSink, MigrationEvent};
use crate::provider::ItemProvider;
use crate::publisher::{ClientError, PublishingClient};
use crate::record::Item;

pub use aliases::{RemoveOriginalAliases, RestoreOriginalAliases};
pub use original::{RemoveOriginal, RemoveOriginalDraftFiles, RestoreOriginal, VerifyOriginal};
pub use references::{CreateNewReferences, RemoveNewReferences};
pub use remote::{PublishRemoteItem, RemoveRemoteItem, WaitForRemoteItem};
pub use send::SendItem;
pub use status::{SetMigratedStatus, SetMigratingStatus};

/// Collaborators shared by all steps of a migration.
#[derive(Clone)]
pub struct MigrationServices {
    pub provider: Arc<dyn ItemProvider>,
    pub publisher: Arc<dyn PublishingClient>,
    pub events: Arc<dyn EventSink>,
    pub config: Arc<MigrationConfig>,
}

impl MigrationServices {
    pub fn new(
        provider: Arc<dyn ItemProvider>,
        publisher: Arc<dyn PublishingClient>,
        events: Arc<dyn EventSink>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            provider,
            publisher,
            events,
            config: Arc::new(config),
        }
    }

    pub fn emit(&self, event: MigrationEvent) {
        self.events.emit(&event);
    }

    /// Report a publishing client error.
    ///
    /// Transport failures are reported as `ConnectionFailed`, any other error
    /// through the event built by `event`.
    pub(crate) fn client_failure(
        &self,
        error: &ClientError,
        event: impl FnOnce(String) -> MigrationEvent,
    ) {
        match error {
            ClientError::Transport(message) => self.emit(MigrationEvent::ConnectionFailed {
                message: message.clone(),
            }),
            other => self.emit(event(other.to_string())),
        }
    }

    /// Destination id of the record, reporting its absence.
    pub(crate) fn destination_of(
        &self,
        context: &MigrationContext,
        transition: &str,
    ) -> Option<String> {
        let destination_id = context.record.destination_id.clone();
        if destination_id.is_none() {
            self.emit(MigrationEvent::MissingDestinationId {
                record_id: context.record.id,
                transition: transition.to_string(),
            });
        }
        destination_id
    }
}

/// The original item of a context, cloned.
pub(crate) fn original_of(context: &MigrationContext) -> Option<Item> {
    context.item.clone()
}

const MISSING_ORIGINAL: &str = "original item is not loaded";
