//! Migration driver passes over a library.

mod common;

use common::{resource_field, Harness, COURSE};
use veo_client::MockPublisher;
use veo_core::{
    CoreError, FileField, ItemProvider, MigrationConfig, MigrationEvent, MigrationState,
    MigrationStatus, RecordUpdate,
};
use veo_store::StoreOp;

#[tokio::test]
async fn test_planned_items_are_migrated_in_order() {
    let harness = Harness::new();
    let first = harness.add_video("first.mp4");
    let second = harness.add_video("second.mp4");
    let first_record = harness.plan(&first).await;
    let second_record = harness.plan(&second).await;

    let report = harness.migrator().run_pending().await.unwrap();

    assert_eq!(report.len(), 2);
    assert!(report.all_migrated());
    assert_eq!(report.outcomes[0].record_id, first_record.id);
    assert_eq!(report.outcomes[1].record_id, second_record.id);
    assert_eq!(report.outcomes[0].status, MigrationStatus::Migrated);
    assert_eq!(report.outcomes[0].state, MigrationState::Migrated);

    let names = harness.events.names();
    assert_eq!(names.first(), Some(&"migration_started"));
    assert_eq!(names.iter().filter(|n| **n == "migration_ended").count(), 2);
}

#[tokio::test]
async fn test_interrupted_migration_is_resumed_first() {
    let publisher = MockPublisher::new().add_remote_item("remote-9");
    let harness = Harness::with_publisher(publisher);
    let planned = harness.add_video("planned.mp4");
    let planned_record = harness.plan(&planned).await;
    let interrupted = harness.add_video("interrupted.mp4");
    let interrupted_record = harness.plan(&interrupted).await;

    let update = RecordUpdate::new()
        .status(MigrationStatus::Migrating)
        .state(MigrationState::Published)
        .destination_id(Some("remote-9".to_string()));
    harness
        .store
        .update_record(interrupted_record.id, &update)
        .await
        .unwrap();

    let report = harness.migrator().run_pending().await.unwrap();

    assert_eq!(report.len(), 2);
    assert_eq!(report.outcomes[0].record_id, interrupted_record.id);
    assert_eq!(report.outcomes[1].record_id, planned_record.id);
    assert!(report.all_migrated());

    // Resumed at the step following the stored state
    assert_eq!(harness.states().first(), Some(&MigrationState::Verified.index()));
    // Only the planned item was uploaded
    assert_eq!(harness.publisher.method_call_count("upload"), 1);
    assert_eq!(harness.store.external_references("remote-9").len(), 1);
}

#[tokio::test]
async fn test_resume_after_original_removed() {
    let publisher = MockPublisher::new().add_remote_item("remote-4");
    let harness = Harness::with_publisher(publisher);
    let item = harness.add_video("lecture.mp4");
    let record = harness.plan(&item).await;

    harness.store.delete_item(item.id).await.unwrap();
    let update = RecordUpdate::new()
        .status(MigrationStatus::Migrating)
        .state(MigrationState::OriginalRemoved)
        .destination_id(Some("remote-4".to_string()));
    harness.store.update_record(record.id, &update).await.unwrap();

    let report = harness.migrator().run_pending().await.unwrap();

    assert!(report.all_migrated());
    let stored = harness.stored(&record).await;
    assert_eq!(stored.status, MigrationStatus::Migrated);
    assert_eq!(stored.new_reference_ids.len(), 1);
}

#[tokio::test]
async fn test_missing_item_fails_and_pass_continues() {
    let harness = Harness::new();
    let gone = harness.add_video("gone.mp4");
    let gone_record = harness.plan(&gone).await;
    harness.store.delete_item(gone.id).await.unwrap();
    let kept = harness.add_video("kept.mp4");
    harness.plan(&kept).await;

    let report = harness.migrator().run_pending().await.unwrap();

    assert_eq!(report.len(), 2);
    assert!(!report.outcomes[0].success);
    assert_eq!(report.outcomes[0].status, MigrationStatus::Error);
    assert!(report.outcomes[1].success);

    assert!(harness.has_event("getting_registered_item_failed"));
    assert_eq!(harness.stored(&gone_record).await.status, MigrationStatus::Error);
}

#[tokio::test]
async fn test_automatic_migration() {
    let harness = Harness::new().config(
        MigrationConfig::new("vimeo")
            .automatic(true)
            .file_field(resource_field()),
    );
    harness.add_video("one.mp4");
    harness.add_video("two.mp4");
    let mut webm = harness.template("three.webm", COURSE, resource_field());
    webm.mime_type = "video/webm".to_string();
    let skipped = harness.store.add_item(&webm, b"webm").unwrap();

    let report = harness.migrator().run_pending().await.unwrap();

    assert_eq!(report.len(), 2);
    assert!(report.all_migrated());
    assert!(harness.store.record_for_item(skipped.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unregistered_items_wait_without_automatic_mode() {
    let harness = Harness::new();
    harness.add_video("one.mp4");

    let report = harness.migrator().run_pending().await.unwrap();
    assert!(report.is_empty());
    assert!(harness.publisher.get_calls().is_empty());
}

#[tokio::test]
async fn test_lookup_failure_skips_field() {
    let labels = FileField::new("mod_label", "intro");
    let harness = Harness::new().config(
        MigrationConfig::new("vimeo")
            .automatic(true)
            .file_field(labels.clone())
            .file_field(resource_field()),
    );
    harness.add_video("one.mp4");
    harness.store.fail_times(StoreOp::NextUnregistered, 1);

    let report = harness.migrator().run_pending().await.unwrap();

    assert_eq!(report.len(), 1);
    let failed_field = harness.events.events().into_iter().find_map(|event| match event {
        MigrationEvent::GettingItemFailed { field, .. } => Some(field),
        _ => None,
    });
    assert_eq!(failed_field, Some(labels.to_string()));
}

#[tokio::test]
async fn test_unpersisted_status_stops_pass() {
    let harness = Harness::new();
    harness.store.fail_on(StoreOp::UpdateStatus);
    let item = harness.add_video("one.mp4");
    harness.plan(&item).await;

    let report = harness.migrator().run_pending().await.unwrap();

    // The record stays planned, it is not picked a second time
    assert_eq!(report.len(), 1);
    assert!(!report.all_migrated());
}

#[tokio::test]
async fn test_invalid_configuration_is_refused() {
    let harness = Harness::new().config(MigrationConfig::new(""));
    let item = harness.add_video("one.mp4");
    harness.plan(&item).await;

    let result = harness.migrator().run_pending().await;
    assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
    assert!(harness.publisher.get_calls().is_empty());
}

#[tokio::test]
async fn test_blocked_items_are_reported() {
    let publisher = MockPublisher::new().simulate_failure(
        "delete",
        veo_core::ClientError::service(403, "publish", "forbidden"),
    );
    let publisher = publisher.with_statuses(vec![veo_core::RemoteState::Error]);
    let harness = Harness::with_publisher(publisher);
    let item = harness.add_video("one.mp4");
    harness.plan(&item).await;

    let report = harness.migrator().run_pending().await.unwrap();

    assert_eq!(report.blocked().count(), 1);
    assert_eq!(report.failed().count(), 1);
    assert!(harness.has_event("migration_failed"));
}

#[tokio::test]
async fn test_record_lookup_failure_keeps_partial_report() {
    let harness = Harness::new();
    let first = harness.add_video("first.mp4");
    let first_record = harness.plan(&first).await;
    let second = harness.add_video("second.mp4");
    let second_record = harness.plan(&second).await;
    // Two lookups select the first record, the third one fails
    harness.store.fail_after(StoreOp::NextByStatus, 2);

    let report = harness.migrator().run_pending().await.unwrap();

    assert_eq!(report.len(), 1);
    assert_eq!(report.outcomes[0].record_id, first_record.id);
    assert!(report.all_migrated());
    assert!(harness.has_event("selecting_record_failed"));
    assert_eq!(harness.stored(&second_record).await.status, MigrationStatus::Planned);
}
