//! Item provider backed by a library.
//!
//! A store lives either in memory or in a directory:
//!
//! ```text
//! <root>/
//! ├── library.json     # Items, trash, contexts and migration records
//! └── media/<key>      # Content of items, by content key
//! ```
//!
//! Every mutation rewrites `library.json`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use veo_core::{
    ContextId, CoreResult, FileField, Item, ItemContext, ItemId, ItemProvider, ItemTemplate,
    MigrationRecord, MigrationState, MigrationStatus, RecordId, RecordUpdate, ReferenceTarget,
};

use crate::error::{StoreError, StoreResult};
use crate::library::Library;

const LIBRARY_FILE: &str = "library.json";
const MEDIA_DIR: &str = "media";

/// Provider operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOp {
    NextByStatus,
    Record,
    Records,
    Plan,
    DeleteRecords,
    UpdateStatus,
    UpdateState,
    UpdateRecord,
    Item,
    TrashedItem,
    NextUnregistered,
    ReadContent,
    Contexts,
    Aliases,
    CreateReference,
    DeleteItem,
    RestoreFromTrash,
    DeleteDraftCopies,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy)]
enum Injection {
    /// Succeed this many more times, then fail for good
    After(usize),
    /// Fail this many more times, then succeed
    Times(usize),
}

enum Media {
    Memory(RwLock<HashMap<String, Vec<u8>>>),
    Directory(PathBuf),
}

/// Item library implementing [`ItemProvider`].
pub struct LibraryStore {
    library: RwLock<Library>,
    media: Media,
    root: Option<PathBuf>,
    failures: RwLock<HashMap<StoreOp, Injection>>,
}

impl LibraryStore {
    /// Create an empty store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            library: RwLock::new(Library::new()),
            media: Media::Memory(RwLock::new(HashMap::new())),
            root: None,
            failures: RwLock::new(HashMap::new()),
        }
    }

    /// Open the store in a directory, creating it if needed.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(MEDIA_DIR))?;

        let path = root.join(LIBRARY_FILE);
        let library = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Library::new()
        };
        info!(
            "Opened library at {} ({} items, {} records)",
            root.display(),
            library.items.len(),
            library.records.len()
        );

        Ok(Self {
            library: RwLock::new(library),
            media: Media::Directory(root.join(MEDIA_DIR)),
            root: Some(root),
            failures: RwLock::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Make every call to an operation fail.
    pub fn fail_on(&self, op: StoreOp) {
        self.fail_after(op, 0);
    }

    /// Let an operation succeed `successes` more times, then fail.
    pub fn fail_after(&self, op: StoreOp, successes: usize) {
        self.failures.write().insert(op, Injection::After(successes));
    }

    /// Make the next `times` calls to an operation fail.
    pub fn fail_times(&self, op: StoreOp, times: usize) {
        self.failures.write().insert(op, Injection::Times(times));
    }

    pub fn clear_failures(&self) {
        self.failures.write().clear();
    }

    fn check(&self, op: StoreOp) -> StoreResult<()> {
        let mut failures = self.failures.write();
        let Some(injection) = failures.get(&op).copied() else {
            return Ok(());
        };
        match injection {
            Injection::After(0) => Err(StoreError::Injected(op)),
            Injection::After(remaining) => {
                failures.insert(op, Injection::After(remaining - 1));
                Ok(())
            }
            Injection::Times(0) => {
                failures.remove(&op);
                Ok(())
            }
            Injection::Times(remaining) => {
                failures.insert(op, Injection::Times(remaining - 1));
                Err(StoreError::Injected(op))
            }
        }
    }

    /// Snapshot of the whole library.
    pub fn library(&self) -> Library {
        self.library.read().clone()
    }

    fn save(&self, library: &Library) -> StoreResult<()> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        let path = root.join(LIBRARY_FILE);
        let tmp = root.join(format!("{}.tmp", LIBRARY_FILE));
        fs::write(&tmp, serde_json::to_string_pretty(library)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Apply a change to the library and persist it.
    ///
    /// The change is made on a copy; the library is left untouched unless
    /// both the change and the save succeed.
    fn mutate<T>(&self, change: impl FnOnce(&mut Library) -> StoreResult<T>) -> StoreResult<T> {
        let mut library = self.library.write();
        let mut next = library.clone();
        let result = change(&mut next)?;
        self.save(&next)?;
        *library = next;
        Ok(result)
    }

    /// Store content, returning its key.
    pub fn add_content(&self, bytes: &[u8]) -> StoreResult<String> {
        let key = Uuid::new_v4().simple().to_string();
        match &self.media {
            Media::Memory(blobs) => {
                blobs.write().insert(key.clone(), bytes.to_vec());
            }
            Media::Directory(dir) => fs::write(dir.join(&key), bytes)?,
        }
        Ok(key)
    }

    fn content(&self, key: &str) -> StoreResult<Vec<u8>> {
        match &self.media {
            Media::Memory(blobs) => blobs
                .read()
                .get(key)
                .cloned()
                .ok_or_else(|| StoreError::ContentNotFound(key.to_string())),
            Media::Directory(dir) => {
                let path = dir.join(key);
                if !path.exists() {
                    return Err(StoreError::ContentNotFound(key.to_string()));
                }
                Ok(fs::read(path)?)
            }
        }
    }

    /// Add an original item with its content.
    pub fn add_item(&self, template: &ItemTemplate, bytes: &[u8]) -> StoreResult<Item> {
        let key = self.add_content(bytes)?;
        let item = self.mutate(|library| Ok(library.insert_item(template, key, None)))?;
        debug!("Added item {} ({})", item.id, item.filename);
        Ok(item)
    }

    /// Add a local reference to an item, in another field or context.
    pub fn add_alias(&self, item: &Item, template: &ItemTemplate) -> StoreResult<Item> {
        self.mutate(|library| {
            Ok(library.insert_item(
                template,
                item.content_hash.clone(),
                Some(ReferenceTarget::Local { item_id: item.id }),
            ))
        })
    }

    /// Add a draft area copy sharing the item's content.
    pub fn add_draft_copy(&self, item: &Item) -> StoreResult<Item> {
        let mut template = item.template();
        template.field = FileField::draft();
        self.mutate(|library| Ok(library.insert_item(&template, item.content_hash.clone(), None)))
    }

    pub fn add_context(&self, context: ItemContext) -> StoreResult<()> {
        self.mutate(|library| {
            library.contexts.insert(context.id, context);
            Ok(())
        })
    }

    /// Replace the content of an item, as an edit would.
    pub fn replace_content(&self, id: ItemId, bytes: &[u8]) -> StoreResult<Item> {
        let key = self.add_content(bytes)?;
        self.mutate(|library| {
            let item = library
                .items
                .get_mut(&id)
                .ok_or(StoreError::ItemNotFound(id))?;
            item.content_hash = key;
            Ok(item.clone())
        })
    }

    pub fn items(&self) -> Vec<Item> {
        self.library.read().items.values().cloned().collect()
    }

    pub fn find_item(&self, id: ItemId) -> Option<Item> {
        self.library.read().items.get(&id).cloned()
    }

    pub fn trash(&self) -> Vec<Item> {
        self.library.read().trash.values().cloned().collect()
    }

    /// Items referencing a remote destination.
    pub fn external_references(&self, destination_id: &str) -> Vec<Item> {
        self.library
            .read()
            .items
            .values()
            .filter(|item| {
                matches!(&item.reference, Some(ReferenceTarget::External { destination_id: id }) if id == destination_id)
            })
            .cloned()
            .collect()
    }

    pub fn find_record(&self, id: RecordId) -> Option<MigrationRecord> {
        self.library.read().records.get(&id).cloned()
    }
}

#[async_trait]
impl ItemProvider for LibraryStore {
    async fn next_by_status(&self, status: MigrationStatus) -> CoreResult<Option<MigrationRecord>> {
        self.check(StoreOp::NextByStatus)?;
        Ok(self
            .library
            .read()
            .records
            .values()
            .find(|record| record.status == status)
            .cloned())
    }

    async fn record(&self, id: RecordId) -> CoreResult<MigrationRecord> {
        self.check(StoreOp::Record)?;
        Ok(self.library.read().record(id)?.clone())
    }

    async fn record_for_item(&self, item_id: ItemId) -> CoreResult<Option<MigrationRecord>> {
        self.check(StoreOp::Record)?;
        Ok(self.library.read().record_for_item(item_id).cloned())
    }

    async fn records(&self, filter: Option<MigrationStatus>) -> CoreResult<Vec<MigrationRecord>> {
        self.check(StoreOp::Records)?;
        Ok(self
            .library
            .read()
            .records
            .values()
            .filter(|record| filter.map_or(true, |status| record.matches(status)))
            .cloned()
            .collect())
    }

    async fn plan(&self, item: &Item) -> CoreResult<MigrationRecord> {
        self.check(StoreOp::Plan)?;
        let record = self.mutate(|library| Ok(library.insert_record(item)))?;
        debug!("Planned item {} as record {}", item.id, record.id);
        Ok(record)
    }

    async fn delete_records(&self, ids: &[RecordId]) -> CoreResult<()> {
        self.check(StoreOp::DeleteRecords)?;
        self.mutate(|library| {
            if let Some(missing) = ids.iter().find(|id| !library.records.contains_key(id)) {
                return Err(StoreError::RecordNotFound(*missing));
            }
            for id in ids {
                library.records.remove(id);
            }
            Ok(())
        })?;
        Ok(())
    }

    async fn update_status(&self, id: RecordId, status: MigrationStatus) -> CoreResult<()> {
        self.check(StoreOp::UpdateStatus)?;
        self.mutate(|library| {
            library.record_mut(id)?.status = status;
            Ok(())
        })?;
        Ok(())
    }

    async fn update_state(&self, id: RecordId, state: MigrationState) -> CoreResult<()> {
        self.check(StoreOp::UpdateState)?;
        self.mutate(|library| {
            library.record_mut(id)?.state = state;
            Ok(())
        })?;
        Ok(())
    }

    async fn update_record(&self, id: RecordId, update: &RecordUpdate) -> CoreResult<()> {
        self.check(StoreOp::UpdateRecord)?;
        self.mutate(|library| library.update_record(id, update))?;
        Ok(())
    }

    async fn item(&self, id: ItemId) -> CoreResult<Item> {
        self.check(StoreOp::Item)?;
        Ok(self.library.read().item(id)?.clone())
    }

    async fn trashed_item(&self, id: ItemId) -> CoreResult<Item> {
        self.check(StoreOp::TrashedItem)?;
        Ok(self.library.read().trashed(id)?.clone())
    }

    async fn next_unregistered(
        &self,
        field: &FileField,
        mime_types: &[String],
    ) -> CoreResult<Option<Item>> {
        self.check(StoreOp::NextUnregistered)?;
        Ok(self
            .library
            .read()
            .next_unregistered(field, mime_types)
            .cloned())
    }

    async fn read_content(&self, item: &Item) -> CoreResult<Vec<u8>> {
        self.check(StoreOp::ReadContent)?;
        Ok(self.content(&item.content_hash)?)
    }

    async fn contexts(&self, ids: &[ContextId]) -> CoreResult<Vec<ItemContext>> {
        self.check(StoreOp::Contexts)?;
        Ok(self.library.read().contexts(ids))
    }

    async fn aliases(&self, item: &Item) -> CoreResult<Vec<Item>> {
        self.check(StoreOp::Aliases)?;
        Ok(self.library.read().aliases(item.id))
    }

    async fn create_reference(
        &self,
        template: &ItemTemplate,
        target: &ReferenceTarget,
    ) -> CoreResult<Item> {
        self.check(StoreOp::CreateReference)?;
        let item = self.mutate(|library| {
            let content_hash = match target {
                ReferenceTarget::Local { item_id } => library.item(*item_id)?.content_hash.clone(),
                ReferenceTarget::External { .. } => String::new(),
            };
            Ok(library.insert_item(template, content_hash, Some(target.clone())))
        })?;
        debug!("Created reference {} in context {}", item.id, item.context_id);
        Ok(item)
    }

    async fn delete_item(&self, id: ItemId) -> CoreResult<()> {
        self.check(StoreOp::DeleteItem)?;
        self.mutate(|library| library.remove_item(id))?;
        Ok(())
    }

    async fn restore_from_trash(&self, item: &Item) -> CoreResult<Item> {
        self.check(StoreOp::RestoreFromTrash)?;
        let restored = self.mutate(|library| library.restore(item.id))?;
        debug!("Restored item {} as {}", item.id, restored.id);
        Ok(restored)
    }

    async fn delete_draft_copies(&self, item: &Item) -> CoreResult<usize> {
        self.check(StoreOp::DeleteDraftCopies)?;
        let removed = self.mutate(|library| {
            let drafts = library.draft_copies(item);
            for id in &drafts {
                library.items.remove(id);
            }
            Ok(drafts.len())
        })?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn template() -> ItemTemplate {
        ItemTemplate {
            filename: "lecture.mp4".to_string(),
            mime_type: "video/mp4".to_string(),
            created_at: Utc::now(),
            context_id: ContextId(1),
            field: FileField::new("mod_resource", "content"),
            owner_email: None,
        }
    }

    #[tokio::test]
    async fn test_read_content() {
        let store = LibraryStore::in_memory();
        let item = store.add_item(&template(), b"frames").unwrap();

        assert_eq!(store.read_content(&item).await.unwrap(), b"frames".to_vec());
    }

    #[tokio::test]
    async fn test_fail_on() {
        let store = LibraryStore::in_memory();
        let item = store.add_item(&template(), b"frames").unwrap();

        store.fail_on(StoreOp::Item);
        assert!(store.item(item.id).await.is_err());

        store.clear_failures();
        assert!(store.item(item.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_after() {
        let store = LibraryStore::in_memory();
        let item = store.add_item(&template(), b"frames").unwrap();

        store.fail_after(StoreOp::Item, 2);
        assert!(store.item(item.id).await.is_ok());
        assert!(store.item(item.id).await.is_ok());
        assert!(store.item(item.id).await.is_err());
    }

    #[tokio::test]
    async fn test_fail_times() {
        let store = LibraryStore::in_memory();
        let item = store.add_item(&template(), b"frames").unwrap();

        store.fail_times(StoreOp::Item, 1);
        assert!(store.item(item.id).await.is_err());
        assert!(store.item(item.id).await.is_ok());
        assert!(store.item(item.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_item_keeps_kind() {
        let store = LibraryStore::in_memory();
        let err = store.delete_item(ItemId(42)).await.unwrap_err();
        assert!(matches!(err, veo_core::CoreError::ItemNotFound(ItemId(42))));
    }

    #[tokio::test]
    async fn test_update_record() {
        let store = LibraryStore::in_memory();
        let item = store.add_item(&template(), b"frames").unwrap();
        let record = store.plan(&item).await.unwrap();

        let update = RecordUpdate::new()
            .destination_id(Some("remote-1".to_string()))
            .status(MigrationStatus::Migrating);
        store.update_record(record.id, &update).await.unwrap();

        let stored = store.record(record.id).await.unwrap();
        assert_eq!(stored.destination_id.as_deref(), Some("remote-1"));
        assert_eq!(stored.status, MigrationStatus::Migrating);
        assert_eq!(
            store.next_by_status(MigrationStatus::Migrating).await.unwrap().map(|r| r.id),
            Some(record.id)
        );
    }
}
