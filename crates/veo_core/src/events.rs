//! Lifecycle events and event sinks.
//!
//! Events are fire-and-forget: a sink must never block the engine or report
//! an error back to it.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CoreResult;
use crate::record::{ItemId, RecordId};
use crate::state::MigrationState;

/// Something that happened while migrating an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MigrationEvent {
    TransitionStarted {
        record_id: RecordId,
        item_id: Option<ItemId>,
        name: String,
    },
    TransitionEnded {
        record_id: RecordId,
        item_id: Option<ItemId>,
        name: String,
    },
    TransitionFailed {
        record_id: RecordId,
        item_id: Option<ItemId>,
        name: String,
    },
    StateChanged {
        record_id: RecordId,
        old: MigrationState,
        new: MigrationState,
    },
    /// The forward path failed and the machine switched to rollback
    Aborted {
        record_id: RecordId,
    },
    MigrationStarted {
        item_id: Option<ItemId>,
        filename: String,
    },
    MigrationEnded {
        item_id: Option<ItemId>,
        filename: String,
    },
    MigrationFailed {
        item_id: Option<ItemId>,
        filename: String,
    },
    UpdatingStatusFailed {
        record_id: RecordId,
        message: String,
    },
    UpdatingStateFailed {
        record_id: RecordId,
        message: String,
    },
    UpdatingRecordItemIdFailed {
        record_id: RecordId,
        item_id: ItemId,
        message: String,
    },
    SendingItemFailed {
        item_id: Option<ItemId>,
        message: String,
    },
    GettingRemoteItemFailed {
        destination_id: String,
        code: i64,
        module: String,
        message: String,
    },
    WaitingForRemoteItemFailed {
        destination_id: String,
        state: i64,
    },
    PollingAttemptsExhausted {
        destination_id: String,
        attempts: u32,
    },
    /// A step needing the remote item ran before it was uploaded
    MissingDestinationId {
        record_id: RecordId,
        transition: String,
    },
    PublishingRemoteItemFailed {
        destination_id: String,
        message: String,
    },
    RemovingRemoteItemFailed {
        destination_id: String,
        message: String,
    },
    ConnectionFailed {
        message: String,
    },
    VerifyingOriginalFailed {
        item_id: Option<ItemId>,
        message: String,
    },
    RemovingOriginalAliasesFailed {
        item_id: Option<ItemId>,
        message: String,
    },
    RemovingOriginalFailed {
        item_id: Option<ItemId>,
        message: String,
    },
    RemovingDraftFilesFailed {
        item_id: Option<ItemId>,
        message: String,
    },
    CreatingReferenceFailed {
        destination_id: String,
        message: String,
    },
    RemovingReferencesFailed {
        record_id: RecordId,
        item_id: Option<ItemId>,
        message: String,
    },
    RestoringOriginalFailed {
        item_id: Option<ItemId>,
        message: String,
    },
    RestoringOriginalAliasesFailed {
        item_id: Option<ItemId>,
        message: String,
    },
    GettingRegisteredItemFailed {
        record_id: RecordId,
        message: String,
    },
    GettingItemFailed {
        field: String,
        message: String,
    },
    /// The driver could not fetch the next record, the pass ends early
    SelectingRecordFailed {
        message: String,
    },
    PlanningItemFailed {
        item_id: ItemId,
        message: String,
    },
}

impl MigrationEvent {
    /// Short event name, as written in logs.
    pub fn name(&self) -> &'static str {
        match self {
            MigrationEvent::TransitionStarted { .. } => "transition_started",
            MigrationEvent::TransitionEnded { .. } => "transition_ended",
            MigrationEvent::TransitionFailed { .. } => "transition_failed",
            MigrationEvent::StateChanged { .. } => "state_changed",
            MigrationEvent::Aborted { .. } => "aborted",
            MigrationEvent::MigrationStarted { .. } => "migration_started",
            MigrationEvent::MigrationEnded { .. } => "migration_ended",
            MigrationEvent::MigrationFailed { .. } => "migration_failed",
            MigrationEvent::UpdatingStatusFailed { .. } => "updating_status_failed",
            MigrationEvent::UpdatingStateFailed { .. } => "updating_state_failed",
            MigrationEvent::UpdatingRecordItemIdFailed { .. } => "updating_record_item_id_failed",
            MigrationEvent::SendingItemFailed { .. } => "sending_item_failed",
            MigrationEvent::GettingRemoteItemFailed { .. } => "getting_remote_item_failed",
            MigrationEvent::WaitingForRemoteItemFailed { .. } => "waiting_for_remote_item_failed",
            MigrationEvent::PollingAttemptsExhausted { .. } => "polling_attempts_exhausted",
            MigrationEvent::MissingDestinationId { .. } => "missing_destination_id",
            MigrationEvent::PublishingRemoteItemFailed { .. } => "publishing_remote_item_failed",
            MigrationEvent::RemovingRemoteItemFailed { .. } => "removing_remote_item_failed",
            MigrationEvent::ConnectionFailed { .. } => "connection_failed",
            MigrationEvent::VerifyingOriginalFailed { .. } => "verifying_original_failed",
            MigrationEvent::RemovingOriginalAliasesFailed { .. } => "removing_original_aliases_failed",
            MigrationEvent::RemovingOriginalFailed { .. } => "removing_original_failed",
            MigrationEvent::RemovingDraftFilesFailed { .. } => "removing_draft_files_failed",
            MigrationEvent::CreatingReferenceFailed { .. } => "creating_reference_failed",
            MigrationEvent::RemovingReferencesFailed { .. } => "removing_references_failed",
            MigrationEvent::RestoringOriginalFailed { .. } => "restoring_original_failed",
            MigrationEvent::RestoringOriginalAliasesFailed { .. } => "restoring_original_aliases_failed",
            MigrationEvent::GettingRegisteredItemFailed { .. } => "getting_registered_item_failed",
            MigrationEvent::GettingItemFailed { .. } => "getting_item_failed",
            MigrationEvent::SelectingRecordFailed { .. } => "selecting_record_failed",
            MigrationEvent::PlanningItemFailed { .. } => "planning_item_failed",
        }
    }

    /// Whether the event reports a failure.
    pub fn is_failure(&self) -> bool {
        !matches!(
            self,
            MigrationEvent::TransitionStarted { .. }
                | MigrationEvent::TransitionEnded { .. }
                | MigrationEvent::StateChanged { .. }
                | MigrationEvent::MigrationStarted { .. }
                | MigrationEvent::MigrationEnded { .. }
        )
    }

    /// Whether the event belongs to the engine's transition lifecycle.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            MigrationEvent::TransitionStarted { .. }
                | MigrationEvent::TransitionEnded { .. }
                | MigrationEvent::TransitionFailed { .. }
                | MigrationEvent::StateChanged { .. }
                | MigrationEvent::Aborted { .. }
        )
    }
}

impl std::fmt::Display for MigrationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationEvent::TransitionStarted { record_id, name, .. } => {
                write!(f, "record {}: transition '{}' started", record_id, name)
            }
            MigrationEvent::TransitionEnded { record_id, name, .. } => {
                write!(f, "record {}: transition '{}' ended", record_id, name)
            }
            MigrationEvent::TransitionFailed { record_id, name, .. } => {
                write!(f, "record {}: transition '{}' failed", record_id, name)
            }
            MigrationEvent::StateChanged { record_id, old, new } => {
                write!(f, "record {}: state {} -> {}", record_id, old, new)
            }
            MigrationEvent::Aborted { record_id } => {
                write!(f, "record {}: migration aborted, rolling back", record_id)
            }
            MigrationEvent::MigrationStarted { filename, .. } => {
                write!(f, "migration of '{}' started", filename)
            }
            MigrationEvent::MigrationEnded { filename, .. } => {
                write!(f, "migration of '{}' ended", filename)
            }
            MigrationEvent::MigrationFailed { filename, .. } => {
                write!(f, "migration of '{}' failed", filename)
            }
            MigrationEvent::GettingRemoteItemFailed {
                destination_id,
                code,
                module,
                message,
            } => write!(
                f,
                "getting remote item {} failed ({} / {}): {}",
                destination_id, module, code, message
            ),
            MigrationEvent::WaitingForRemoteItemFailed { destination_id, state } => write!(
                f,
                "remote item {} reached state {} while waiting",
                destination_id, state
            ),
            MigrationEvent::PollingAttemptsExhausted { destination_id, attempts } => write!(
                f,
                "remote item {} still processing after {} status requests",
                destination_id, attempts
            ),
            MigrationEvent::MissingDestinationId { record_id, transition } => write!(
                f,
                "record {}: '{}' needs a remote item but none was uploaded",
                record_id, transition
            ),
            MigrationEvent::ConnectionFailed { message } => {
                write!(f, "connection failed: {}", message)
            }
            other => {
                let message = match other {
                    MigrationEvent::UpdatingStatusFailed { message, .. }
                    | MigrationEvent::UpdatingStateFailed { message, .. }
                    | MigrationEvent::UpdatingRecordItemIdFailed { message, .. }
                    | MigrationEvent::SendingItemFailed { message, .. }
                    | MigrationEvent::PublishingRemoteItemFailed { message, .. }
                    | MigrationEvent::RemovingRemoteItemFailed { message, .. }
                    | MigrationEvent::VerifyingOriginalFailed { message, .. }
                    | MigrationEvent::RemovingOriginalAliasesFailed { message, .. }
                    | MigrationEvent::RemovingOriginalFailed { message, .. }
                    | MigrationEvent::RemovingDraftFilesFailed { message, .. }
                    | MigrationEvent::CreatingReferenceFailed { message, .. }
                    | MigrationEvent::RemovingReferencesFailed { message, .. }
                    | MigrationEvent::RestoringOriginalFailed { message, .. }
                    | MigrationEvent::RestoringOriginalAliasesFailed { message, .. }
                    | MigrationEvent::GettingRegisteredItemFailed { message, .. }
                    | MigrationEvent::GettingItemFailed { message, .. }
                    | MigrationEvent::SelectingRecordFailed { message }
                    | MigrationEvent::PlanningItemFailed { message, .. } => message.as_str(),
                    _ => "",
                };
                write!(f, "{}: {}", other.name().replace('_', " "), message)
            }
        }
    }
}

/// Destination of lifecycle events.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &MigrationEvent);
}

/// Writes every event to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &MigrationEvent) {
        if event.is_failure() {
            warn!(event = event.name(), "{}", event);
        } else {
            info!(event = event.name(), "{}", event);
        }
    }
}

/// Keeps events in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<MigrationEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events received so far.
    pub fn events(&self) -> Vec<MigrationEvent> {
        self.events.lock().clone()
    }

    /// Transition lifecycle events only.
    pub fn lifecycle(&self) -> Vec<MigrationEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.is_lifecycle())
            .cloned()
            .collect()
    }

    /// Names of the received events, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|event| event.name()).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &MigrationEvent) {
        self.events.lock().push(event.clone());
    }
}

#[derive(Serialize)]
struct EventLine<'a> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a MigrationEvent,
}

/// Appends one JSON document per event to a file.
pub struct JsonLinesSink {
    file: Mutex<File>,
}

impl JsonLinesSink {
    /// Open (or create) the event log in append mode.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl EventSink for JsonLinesSink {
    fn emit(&self, event: &MigrationEvent) {
        let line = EventLine {
            timestamp: Utc::now(),
            event,
        };
        let json = match serde_json::to_string(&line) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize event {}: {}", event.name(), e);
                return;
            }
        };
        if let Err(e) = writeln!(self.file.lock(), "{}", json) {
            warn!("Failed to write event {}: {}", event.name(), e);
        }
    }
}

/// Forwards every event to several sinks.
#[derive(Default, Clone)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for MultiSink {
    fn emit(&self, event: &MigrationEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn started() -> MigrationEvent {
        MigrationEvent::TransitionStarted {
            record_id: RecordId(1),
            item_id: Some(ItemId(2)),
            name: "send_item".to_string(),
        }
    }

    #[test]
    fn test_failure_classification() {
        assert!(!started().is_failure());
        assert!(started().is_lifecycle());
        assert!(MigrationEvent::Aborted { record_id: RecordId(1) }.is_failure());
        assert!(MigrationEvent::ConnectionFailed {
            message: "refused".to_string()
        }
        .is_failure());
        assert!(!MigrationEvent::MigrationStarted {
            item_id: None,
            filename: "a.mp4".to_string()
        }
        .is_lifecycle());
    }

    #[test]
    fn test_display() {
        let event = MigrationEvent::StateChanged {
            record_id: RecordId(4),
            old: MigrationState::Sent,
            new: MigrationState::Treated,
        };
        assert_eq!(event.to_string(), "record 4: state sent -> treated");

        let event = MigrationEvent::RemovingOriginalFailed {
            item_id: Some(ItemId(9)),
            message: "locked".to_string(),
        };
        assert_eq!(event.to_string(), "removing original failed: locked");
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.emit(&started());
        sink.emit(&MigrationEvent::MigrationStarted {
            item_id: Some(ItemId(2)),
            filename: "a.mp4".to_string(),
        });

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.lifecycle(), vec![started()]);
        assert_eq!(sink.names(), vec!["transition_started", "migration_started"]);

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_json_lines_sink() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("events.jsonl");

        let sink = JsonLinesSink::open(&path).unwrap();
        sink.emit(&started());
        sink.emit(&MigrationEvent::Aborted { record_id: RecordId(1) });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "transition_started");
        assert_eq!(first["name"], "send_item");
        assert!(first["timestamp"].is_string());
    }

    #[test]
    fn test_multi_sink_fans_out() {
        let mut first = MockEventSink::new();
        first.expect_emit().times(2).return_const(());
        let mut second = MockEventSink::new();
        second
            .expect_emit()
            .withf(|event| event.name() == "transition_started" || event.name() == "aborted")
            .times(2)
            .return_const(());

        let sink = MultiSink::new()
            .with(Arc::new(first))
            .with(Arc::new(second));
        assert_eq!(sink.len(), 2);

        sink.emit(&started());
        sink.emit(&MigrationEvent::Aborted { record_id: RecordId(1) });
    }
}
