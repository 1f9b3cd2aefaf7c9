//! Shared fixtures: an in-memory library, a mock publishing service and a
//! recording event sink wired into migration services.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use veo_client::MockPublisher;
use veo_core::{
    ContextId, ContextKind, FileField, Item, ItemContext, ItemProvider, ItemTemplate,
    MigrationConfig, MigrationEvent, MigrationMachine, MigrationRecord, MigrationServices,
    Migrator, Planner, RecordingSink,
};
use veo_store::LibraryStore;

pub const COURSE: ContextId = ContextId(100);
pub const OTHER_COURSE: ContextId = ContextId(200);

pub fn resource_field() -> FileField {
    FileField::new("mod_resource", "content")
}

pub struct Harness {
    pub store: Arc<LibraryStore>,
    pub publisher: MockPublisher,
    pub events: Arc<RecordingSink>,
    pub config: MigrationConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_publisher(MockPublisher::new())
    }

    pub fn with_publisher(publisher: MockPublisher) -> Self {
        let store = LibraryStore::in_memory();
        store
            .add_context(
                ItemContext::new(COURSE, ContextKind::Course).with_token("courseid", "PHY-101"),
            )
            .expect("context");
        store
            .add_context(
                ItemContext::new(OTHER_COURSE, ContextKind::Course).with_token("courseid", "CHM-200"),
            )
            .expect("context");

        Self {
            store: Arc::new(store),
            publisher,
            events: Arc::new(RecordingSink::new()),
            config: MigrationConfig::new("vimeo").file_field(resource_field()),
        }
    }

    pub fn config(mut self, config: MigrationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn services(&self) -> MigrationServices {
        MigrationServices::new(
            self.store.clone(),
            Arc::new(self.publisher.clone()),
            self.events.clone(),
            self.config.clone(),
        )
    }

    pub fn migrator(&self) -> Migrator {
        Migrator::new(self.services())
    }

    pub fn planner(&self) -> Planner {
        Planner::new(self.store.clone(), Arc::new(self.config.clone()))
    }

    pub fn template(&self, filename: &str, context_id: ContextId, field: FileField) -> ItemTemplate {
        ItemTemplate {
            filename: filename.to_string(),
            mime_type: "video/mp4".to_string(),
            created_at: Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap(),
            context_id,
            field,
            owner_email: None,
        }
    }

    /// Add an original video in the course resource field.
    pub fn add_video(&self, filename: &str) -> Item {
        self.store
            .add_item(&self.template(filename, COURSE, resource_field()), filename.as_bytes())
            .expect("item")
    }

    pub fn add_alias(&self, item: &Item, context_id: ContextId) -> Item {
        let template = self.template(&item.filename, context_id, FileField::new("mod_label", "intro"));
        self.store.add_alias(item, &template).expect("alias")
    }

    pub async fn plan(&self, item: &Item) -> MigrationRecord {
        self.store.plan(item).await.expect("record")
    }

    pub fn machine(&self, record: MigrationRecord, item: Item) -> MigrationMachine {
        MigrationMachine::new(self.services(), record, Some(item)).expect("machine")
    }

    pub async fn stored(&self, record: &MigrationRecord) -> MigrationRecord {
        self.store.record(record.id).await.expect("stored record")
    }

    /// Lifecycle events as compact strings.
    pub fn trace(&self) -> Vec<String> {
        self.events
            .lifecycle()
            .iter()
            .map(|event| match event {
                MigrationEvent::TransitionStarted { name, .. } => format!("started:{}", name),
                MigrationEvent::TransitionEnded { name, .. } => format!("ended:{}", name),
                MigrationEvent::TransitionFailed { name, .. } => format!("failed:{}", name),
                MigrationEvent::StateChanged { old, new, .. } => {
                    format!("state:{}->{}", old.index(), new.index())
                }
                other => other.name().to_string(),
            })
            .collect()
    }

    /// Visited states, in order.
    pub fn states(&self) -> Vec<usize> {
        self.events
            .events()
            .iter()
            .filter_map(|event| match event {
                MigrationEvent::StateChanged { new, .. } => Some(new.index()),
                _ => None,
            })
            .collect()
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.events.names().contains(&name)
    }
}
