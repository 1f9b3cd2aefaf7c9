//! Item provider contract.
//!
//! The provider owns durable storage of items and migration records. Every
//! operation may fail; steps turn failures into a failed transition.

use async_trait::async_trait;

use crate::context::ItemContext;
use crate::error::CoreResult;
use crate::record::{
    ContextId, FileField, Item, ItemId, ItemTemplate, MigrationRecord, RecordId, RecordUpdate,
    ReferenceTarget,
};
use crate::state::{MigrationState, MigrationStatus};

#[async_trait]
pub trait ItemProvider: Send + Sync {
    /// First record with the given stored status.
    async fn next_by_status(&self, status: MigrationStatus) -> CoreResult<Option<MigrationRecord>>;

    async fn record(&self, id: RecordId) -> CoreResult<MigrationRecord>;

    /// The record registered for an item, if any.
    async fn record_for_item(&self, item_id: ItemId) -> CoreResult<Option<MigrationRecord>>;

    /// Records matching a listing filter, or all records.
    async fn records(&self, filter: Option<MigrationStatus>) -> CoreResult<Vec<MigrationRecord>>;

    /// Register an item: status `Planned`, state `NotInitialized`.
    async fn plan(&self, item: &Item) -> CoreResult<MigrationRecord>;

    async fn delete_records(&self, ids: &[RecordId]) -> CoreResult<()>;

    async fn update_status(&self, id: RecordId, status: MigrationStatus) -> CoreResult<()>;

    async fn update_state(&self, id: RecordId, state: MigrationState) -> CoreResult<()>;

    async fn update_record(&self, id: RecordId, update: &RecordUpdate) -> CoreResult<()>;

    async fn item(&self, id: ItemId) -> CoreResult<Item>;

    /// An item that was deleted and is still held in the trash.
    async fn trashed_item(&self, id: ItemId) -> CoreResult<Item>;

    /// First original item of a field that has no record yet.
    async fn next_unregistered(
        &self,
        field: &FileField,
        mime_types: &[String],
    ) -> CoreResult<Option<Item>>;

    async fn read_content(&self, item: &Item) -> CoreResult<Vec<u8>>;

    async fn contexts(&self, ids: &[ContextId]) -> CoreResult<Vec<ItemContext>>;

    /// Local references pointing at an item.
    async fn aliases(&self, item: &Item) -> CoreResult<Vec<Item>>;

    async fn create_reference(
        &self,
        template: &ItemTemplate,
        target: &ReferenceTarget,
    ) -> CoreResult<Item>;

    /// Delete an item; originals go to the trash.
    async fn delete_item(&self, id: ItemId) -> CoreResult<()>;

    /// Bring a trashed item back. The restored item gets a new id.
    async fn restore_from_trash(&self, item: &Item) -> CoreResult<Item>;

    /// Delete draft copies sharing the item's content, returning how many went.
    async fn delete_draft_copies(&self, item: &Item) -> CoreResult<usize>;
}
