//! Migration driver: picks the next eligible item and migrates it, one item
//! at a time.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::events::MigrationEvent;
use crate::migration::MigrationMachine;
use crate::record::{Item, ItemId, MigrationRecord, RecordId};
use crate::state::{MigrationState, MigrationStatus};
use crate::transitions::MigrationServices;

/// Result of the migration of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub record_id: RecordId,
    pub item_id: Option<ItemId>,
    pub filename: String,
    pub state: MigrationState,
    /// Effective status, `Blocked` when the rollback failed too
    pub status: MigrationStatus,
    pub success: bool,
}

impl ItemOutcome {
    fn from_record(record: &MigrationRecord, success: bool) -> Self {
        Self {
            record_id: record.id,
            item_id: record.item_id,
            filename: record.filename.clone(),
            state: record.state,
            status: record.effective_status(),
            success,
        }
    }
}

/// Outcomes of one driver pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl MigrationReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn migrated(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.success)
    }

    pub fn blocked(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == MigrationStatus::Blocked)
    }

    /// Whether every item of the pass was migrated.
    pub fn all_migrated(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.success)
    }
}

/// Runs migrations for registered (and, optionally, unregistered) items.
pub struct Migrator {
    services: MigrationServices,
}

impl Migrator {
    pub fn new(services: MigrationServices) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &MigrationServices {
        &self.services
    }

    /// Migrate every eligible item, one after the other.
    ///
    /// Interrupted migrations are resumed first, then planned items are
    /// migrated. With automatic migration enabled, unregistered items of the
    /// configured fields are planned and migrated once nothing else is left.
    /// A failure to fetch the next record ends the pass early; the report
    /// still lists the items handled before it.
    pub async fn run_pending(&self) -> CoreResult<MigrationReport> {
        self.services.config.validate()?;

        let mut report = MigrationReport::default();
        let mut seen: HashSet<RecordId> = HashSet::new();

        loop {
            let record = match self.next_record().await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) => {
                    self.services.emit(MigrationEvent::SelectingRecordFailed {
                        message: e.to_string(),
                    });
                    break;
                }
            };
            if !seen.insert(record.id) {
                warn!(
                    "Record {} selected twice in the same pass, its status could not be updated",
                    record.id
                );
                break;
            }
            let outcome = self.migrate_record(record).await;
            report.outcomes.push(outcome);
        }

        info!(
            "Migration pass done: {} migrated, {} failed",
            report.migrated().count(),
            report.failed().count()
        );
        Ok(report)
    }

    /// Next record to migrate.
    async fn next_record(&self) -> CoreResult<Option<MigrationRecord>> {
        let provider = &self.services.provider;

        if let Some(record) = provider.next_by_status(MigrationStatus::Migrating).await? {
            info!("Resuming migration of record {} at state {}", record.id, record.state);
            return Ok(Some(record));
        }
        if let Some(record) = provider.next_by_status(MigrationStatus::Planned).await? {
            return Ok(Some(record));
        }
        if !self.services.config.automatic_migration {
            return Ok(None);
        }

        let config = &self.services.config;
        for field in &config.file_fields {
            let item = match provider
                .next_unregistered(field, &config.accepted_mime_types)
                .await
            {
                Ok(Some(item)) => item,
                Ok(None) => continue,
                Err(e) => {
                    self.services.emit(MigrationEvent::GettingItemFailed {
                        field: field.to_string(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            match provider.plan(&item).await {
                Ok(record) => {
                    info!("Planned item {} ({}) for automatic migration", item.id, item.filename);
                    return Ok(Some(record));
                }
                Err(e) => {
                    self.services.emit(MigrationEvent::PlanningItemFailed {
                        item_id: item.id,
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(None)
    }

    /// Item a record refers to, looked up in the trash once it was deleted.
    async fn load_item(&self, record: &MigrationRecord) -> CoreResult<Item> {
        let item_id = record.item_id.ok_or_else(|| {
            CoreError::InvalidState(format!("record {} has no source item", record.id))
        })?;
        if record.state >= MigrationState::OriginalRemoved {
            self.services.provider.trashed_item(item_id).await
        } else {
            self.services.provider.item(item_id).await
        }
    }

    /// Migrate the item of a record, resuming from its stored state.
    pub async fn migrate_record(&self, record: MigrationRecord) -> ItemOutcome {
        self.services.emit(MigrationEvent::MigrationStarted {
            item_id: record.item_id,
            filename: record.filename.clone(),
        });

        let machine = match self.load_item(&record).await {
            Ok(item) => MigrationMachine::new(self.services.clone(), record.clone(), Some(item)),
            Err(e) => Err(e),
        };

        let mut machine = match machine {
            Ok(machine) => machine,
            Err(e) => {
                self.services.emit(MigrationEvent::GettingRegisteredItemFailed {
                    record_id: record.id,
                    message: e.to_string(),
                });
                return self.fail_unstarted(record).await;
            }
        };

        let success = machine.run().await;
        let outcome = ItemOutcome::from_record(machine.record(), success);

        if success {
            info!("Item '{}' migrated (record {})", outcome.filename, outcome.record_id);
            self.services.emit(MigrationEvent::MigrationEnded {
                item_id: outcome.item_id,
                filename: outcome.filename.clone(),
            });
        } else {
            error!(
                "Migration of '{}' (record {}) failed: state {}, status {}",
                outcome.filename, outcome.record_id, outcome.state, outcome.status
            );
            self.services.emit(MigrationEvent::MigrationFailed {
                item_id: outcome.item_id,
                filename: outcome.filename.clone(),
            });
        }
        outcome
    }

    /// Flag a record whose migration could not start as failed.
    async fn fail_unstarted(&self, mut record: MigrationRecord) -> ItemOutcome {
        if let Err(e) = self
            .services
            .provider
            .update_status(record.id, MigrationStatus::Error)
            .await
        {
            self.services.emit(MigrationEvent::UpdatingStatusFailed {
                record_id: record.id,
                message: e.to_string(),
            });
        }
        record.status = MigrationStatus::Error;

        let outcome = ItemOutcome::from_record(&record, false);
        error!(
            "Migration of '{}' (record {}) could not start",
            outcome.filename, outcome.record_id
        );
        self.services.emit(MigrationEvent::MigrationFailed {
            item_id: outcome.item_id,
            filename: outcome.filename.clone(),
        });
        outcome
    }
}
