//! Planning, deregistration and status reporting.

mod common;

use common::{resource_field, Harness, COURSE, OTHER_COURSE};
use veo_core::{
    CoreError, FileField, ItemId, ItemProvider, MigrationState, MigrationStatus, RecordUpdate,
};

#[tokio::test]
async fn test_plan_items() {
    let harness = Harness::new();
    let first = harness.add_video("first.mp4");
    let second = harness.add_video("second.mp4");

    let records = harness.planner().plan(&[first.id, second.id]).await.unwrap();

    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.status, MigrationStatus::Planned);
        assert_eq!(record.state, MigrationState::NotInitialized);
        assert_eq!(record.context_ids, vec![COURSE]);
    }
    assert_eq!(
        harness.planner().status_of(first.id).await.unwrap(),
        MigrationStatus::Planned
    );
}

#[tokio::test]
async fn test_plan_rejects_unsupported_items() {
    let harness = Harness::new();
    let item = harness.add_video("lecture.mp4");
    let alias = harness.add_alias(&item, OTHER_COURSE);
    let draft = harness.store.add_draft_copy(&item).unwrap();
    let mut audio = harness.template("talk.mp3", COURSE, resource_field());
    audio.mime_type = "audio/mpeg".to_string();
    let audio = harness.store.add_item(&audio, b"talk").unwrap();

    let planner = harness.planner();
    for id in [alias.id, draft.id, audio.id] {
        let result = planner.plan(&[id]).await;
        assert!(matches!(result, Err(CoreError::NotSupported(_))), "item {}", id);
    }
    assert_eq!(
        planner.status_of(audio.id).await.unwrap(),
        MigrationStatus::NotSupported
    );
}

#[tokio::test]
async fn test_plan_batch_is_all_or_nothing() {
    let harness = Harness::new();
    let good = harness.add_video("good.mp4");
    let mut bad = harness.template("bad.avi", COURSE, resource_field());
    bad.mime_type = "video/x-msvideo".to_string();
    let bad = harness.store.add_item(&bad, b"avi").unwrap();

    let planner = harness.planner();
    assert!(planner.plan(&[good.id, bad.id]).await.is_err());
    assert_eq!(
        planner.status_of(good.id).await.unwrap(),
        MigrationStatus::Unregistered
    );
    assert!(planner.records(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_plan_rejects_registered_and_unknown_items() {
    let harness = Harness::new();
    let item = harness.add_video("lecture.mp4");
    let planner = harness.planner();
    planner.plan(&[item.id]).await.unwrap();

    assert!(matches!(
        planner.plan(&[item.id]).await,
        Err(CoreError::AlreadyRegistered(id)) if id == item.id
    ));
    assert!(matches!(
        planner.plan(&[ItemId(999)]).await,
        Err(CoreError::ItemNotFound(_))
    ));
}

#[tokio::test]
async fn test_deregister_before_start_only() {
    let harness = Harness::new();
    let waiting = harness.add_video("waiting.mp4");
    let started = harness.add_video("started.mp4");
    let planner = harness.planner();
    let records = planner.plan(&[waiting.id, started.id]).await.unwrap();

    let update = RecordUpdate::new()
        .status(MigrationStatus::Migrating)
        .state(MigrationState::Sent);
    harness.store.update_record(records[1].id, &update).await.unwrap();

    assert!(matches!(
        planner.deregister(&[records[0].id, records[1].id]).await,
        Err(CoreError::InvalidState(_))
    ));
    // Nothing removed
    assert_eq!(planner.records(None).await.unwrap().len(), 2);

    planner.deregister(&[records[0].id]).await.unwrap();
    assert_eq!(
        planner.status_of(waiting.id).await.unwrap(),
        MigrationStatus::Unregistered
    );
}

#[tokio::test]
async fn test_error_and_blocked_statuses() {
    let harness = Harness::new();
    let failed = harness.add_video("failed.mp4");
    let blocked = harness.add_video("blocked.mp4");
    let planner = harness.planner();
    let records = planner.plan(&[failed.id, blocked.id]).await.unwrap();

    harness
        .store
        .update_status(records[0].id, MigrationStatus::Error)
        .await
        .unwrap();
    harness
        .store
        .update_record(
            records[1].id,
            &RecordUpdate::new()
                .status(MigrationStatus::Error)
                .state(MigrationState::OriginalRemoved),
        )
        .await
        .unwrap();

    assert_eq!(planner.status_of(failed.id).await.unwrap(), MigrationStatus::Error);
    assert_eq!(planner.status_of(blocked.id).await.unwrap(), MigrationStatus::Blocked);

    let errors = planner.records(Some(MigrationStatus::Error)).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].id, records[0].id);

    let blocked_records = planner.records(Some(MigrationStatus::Blocked)).await.unwrap();
    assert_eq!(blocked_records.len(), 1);
    assert_eq!(blocked_records[0].id, records[1].id);
}

#[tokio::test]
async fn test_draft_field_is_not_a_migration_source() {
    let harness = Harness::new();
    let template = harness.template("draft.mp4", COURSE, FileField::draft());
    let draft = harness.store.add_item(&template, b"draft").unwrap();

    assert_eq!(
        harness.planner().status_of(draft.id).await.unwrap(),
        MigrationStatus::NotSupported
    );
}
