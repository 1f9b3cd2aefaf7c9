//! The migration state machine: the step catalogue and the hooks keeping
//! the migration record and the event sink up to date.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::context::MigrationContext;
use crate::error::CoreResult;
use crate::events::MigrationEvent;
use crate::machine::{Catalogue, MachineHooks, NoOperation, StateMachine, Transition};
use crate::record::{Item, MigrationRecord};
use crate::state::{MigrationState, MigrationStatus};
use crate::transitions::{
    CreateNewReferences, MigrationServices, PublishRemoteItem, RemoveNewReferences,
    RemoveOriginal, RemoveOriginalAliases, RemoveOriginalDraftFiles, RemoveRemoteItem, RestoreOriginal,
    RestoreOriginalAliases, SendItem, SetMigratedStatus, SetMigratingStatus, VerifyOriginal,
    WaitForRemoteItem,
};

pub type MigrationCatalogue = Catalogue<MigrationState, MigrationContext>;

/// Build the catalogue of migration steps.
pub fn migration_catalogue(services: &MigrationServices) -> MigrationCatalogue {
    use MigrationState::*;

    let noop = || -> Arc<dyn Transition<MigrationContext>> { Arc::new(NoOperation::new()) };
    let s = || services.clone();

    Catalogue::new(MigrationState::ALL.to_vec())
        .forward(NotInitialized, Initialized, Arc::new(SetMigratingStatus::new(s())))
        .forward(Initialized, Sent, Arc::new(SendItem::new(s())))
        .forward(Sent, Treated, Arc::new(WaitForRemoteItem::new(s())))
        .forward(Treated, Published, Arc::new(PublishRemoteItem::new(s())))
        .forward(Published, Verified, Arc::new(VerifyOriginal::new(s())))
        .forward(Verified, OriginalAliasesRemoved, Arc::new(RemoveOriginalAliases::new(s())))
        .forward(OriginalAliasesRemoved, OriginalRemoved, Arc::new(RemoveOriginal::new(s())))
        .forward(
            OriginalRemoved,
            OriginalDraftFilesRemoved,
            Arc::new(RemoveOriginalDraftFiles::new(s())),
        )
        .forward(
            OriginalDraftFilesRemoved,
            NewReferencesCreated,
            Arc::new(CreateNewReferences::new(s())),
        )
        .forward(NewReferencesCreated, Migrated, Arc::new(SetMigratedStatus::new(s())))
        .rollback(Migrated, NewReferencesCreated, noop())
        .rollback(
            NewReferencesCreated,
            OriginalDraftFilesRemoved,
            Arc::new(RemoveNewReferences::new(s())),
        )
        .rollback(OriginalDraftFilesRemoved, OriginalRemoved, noop())
        .rollback(OriginalRemoved, OriginalAliasesRemoved, Arc::new(RestoreOriginal::new(s())))
        .rollback(
            OriginalAliasesRemoved,
            Verified,
            Arc::new(RestoreOriginalAliases::new(s())),
        )
        .rollback(Verified, Published, noop())
        .rollback(Published, Treated, noop())
        .rollback(Treated, Sent, noop())
        .rollback(Sent, Initialized, Arc::new(RemoveRemoteItem::new(s())))
        .rollback(Initialized, NotInitialized, noop())
}

/// Persists state and status changes and forwards lifecycle events.
pub struct MigrationHooks {
    services: MigrationServices,
}

impl MigrationHooks {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl MachineHooks<MigrationState, MigrationContext> for MigrationHooks {
    async fn state_changed(
        &self,
        context: &mut MigrationContext,
        old: MigrationState,
        new: MigrationState,
    ) {
        let record_id = context.record.id;
        if let Err(e) = self.services.provider.update_state(record_id, new).await {
            warn!("State {} of record {} not persisted: {}", new, record_id, e);
            self.services.emit(MigrationEvent::UpdatingStateFailed {
                record_id,
                message: e.to_string(),
            });
        }
        context.record.state = new;
        self.services
            .emit(MigrationEvent::StateChanged { record_id, old, new });
    }

    fn transition_started(&self, context: &MigrationContext, name: &str) {
        self.services.emit(MigrationEvent::TransitionStarted {
            record_id: context.record.id,
            item_id: context.record.item_id,
            name: name.to_string(),
        });
    }

    fn transition_ended(&self, context: &MigrationContext, name: &str) {
        self.services.emit(MigrationEvent::TransitionEnded {
            record_id: context.record.id,
            item_id: context.record.item_id,
            name: name.to_string(),
        });
    }

    fn transition_failed(&self, context: &MigrationContext, name: &str) {
        self.services.emit(MigrationEvent::TransitionFailed {
            record_id: context.record.id,
            item_id: context.record.item_id,
            name: name.to_string(),
        });
    }

    async fn aborted(&self, context: &mut MigrationContext) {
        let record_id = context.record.id;
        if let Err(e) = self
            .services
            .provider
            .update_status(record_id, MigrationStatus::Error)
            .await
        {
            self.services.emit(MigrationEvent::UpdatingStatusFailed {
                record_id,
                message: e.to_string(),
            });
        }
        context.record.status = MigrationStatus::Error;
        self.services.emit(MigrationEvent::Aborted { record_id });
    }
}

/// Migrates one item, starting from the state stored on its record.
pub struct MigrationMachine {
    machine: StateMachine<MigrationState, MigrationContext>,
}

impl MigrationMachine {
    /// Create a machine running the standard catalogue.
    pub fn new(
        services: MigrationServices,
        record: MigrationRecord,
        item: Option<Item>,
    ) -> CoreResult<Self> {
        let catalogue = migration_catalogue(&services);
        Self::with_catalogue(catalogue, services, record, item)
    }

    /// Create a machine running a custom catalogue.
    pub fn with_catalogue(
        catalogue: MigrationCatalogue,
        services: MigrationServices,
        record: MigrationRecord,
        item: Option<Item>,
    ) -> CoreResult<Self> {
        let initial = record.state;
        let hooks = Arc::new(MigrationHooks::new(services));
        let machine = StateMachine::new(
            catalogue,
            initial,
            MigrationContext::new(record, item),
            hooks,
        )?;
        Ok(Self { machine })
    }

    /// Run the migration. Returns `true` when the item was migrated.
    pub async fn run(&mut self) -> bool {
        self.machine.run().await
    }

    pub fn state(&self) -> MigrationState {
        self.machine.state()
    }

    pub fn record(&self) -> &MigrationRecord {
        &self.machine.context().record
    }

    pub fn context(&self) -> &MigrationContext {
        self.machine.context()
    }

    pub fn into_context(self) -> MigrationContext {
        self.machine.into_context()
    }
}
