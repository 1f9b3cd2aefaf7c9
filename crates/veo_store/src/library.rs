//! Library contents: items, trash, contexts and migration records.
//!
//! The library is a plain serializable value. `LibraryStore` wraps it with
//! locking, persistence and failure injection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use veo_core::{
    ContextId, FileField, Item, ItemContext, ItemId, ItemTemplate, MigrationRecord, RecordId,
    RecordUpdate, ReferenceTarget,
};

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Library {
    #[serde(default)]
    pub items: BTreeMap<ItemId, Item>,
    /// Deleted originals, kept until restored
    #[serde(default)]
    pub trash: BTreeMap<ItemId, Item>,
    #[serde(default)]
    pub contexts: BTreeMap<ContextId, ItemContext>,
    #[serde(default)]
    pub records: BTreeMap<RecordId, MigrationRecord>,
    #[serde(default)]
    last_item_id: u64,
    #[serde(default)]
    last_record_id: u64,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_item_id(&mut self) -> ItemId {
        self.last_item_id += 1;
        ItemId(self.last_item_id)
    }

    fn next_record_id(&mut self) -> RecordId {
        self.last_record_id += 1;
        RecordId(self.last_record_id)
    }

    pub fn item(&self, id: ItemId) -> StoreResult<&Item> {
        self.items.get(&id).ok_or(StoreError::ItemNotFound(id))
    }

    pub fn trashed(&self, id: ItemId) -> StoreResult<&Item> {
        self.trash.get(&id).ok_or(StoreError::NotInTrash(id))
    }

    pub fn record(&self, id: RecordId) -> StoreResult<&MigrationRecord> {
        self.records.get(&id).ok_or(StoreError::RecordNotFound(id))
    }

    pub fn record_mut(&mut self, id: RecordId) -> StoreResult<&mut MigrationRecord> {
        self.records
            .get_mut(&id)
            .ok_or(StoreError::RecordNotFound(id))
    }

    pub fn record_for_item(&self, item_id: ItemId) -> Option<&MigrationRecord> {
        self.records
            .values()
            .find(|record| record.item_id == Some(item_id))
    }

    /// Add an item built from a template.
    pub fn insert_item(
        &mut self,
        template: &ItemTemplate,
        content_hash: impl Into<String>,
        reference: Option<ReferenceTarget>,
    ) -> Item {
        let item = Item {
            id: self.next_item_id(),
            filename: template.filename.clone(),
            mime_type: template.mime_type.clone(),
            created_at: template.created_at,
            content_hash: content_hash.into(),
            context_id: template.context_id,
            field: template.field.clone(),
            owner_email: template.owner_email.clone(),
            reference,
        };
        self.items.insert(item.id, item.clone());
        item
    }

    pub fn insert_record(&mut self, item: &Item) -> MigrationRecord {
        let record = MigrationRecord::planned(self.next_record_id(), item, vec![item.context_id]);
        self.records.insert(record.id, record.clone());
        record
    }

    pub fn update_record(&mut self, id: RecordId, update: &RecordUpdate) -> StoreResult<()> {
        update.apply(self.record_mut(id)?);
        Ok(())
    }

    /// Remove an item. Originals move to the trash, references are dropped.
    pub fn remove_item(&mut self, id: ItemId) -> StoreResult<Item> {
        let item = self.items.remove(&id).ok_or(StoreError::ItemNotFound(id))?;
        if !item.is_reference() {
            self.trash.insert(id, item.clone());
        }
        Ok(item)
    }

    /// Move a trashed item back under a new id.
    pub fn restore(&mut self, id: ItemId) -> StoreResult<Item> {
        let mut item = self.trash.remove(&id).ok_or(StoreError::NotInTrash(id))?;
        item.id = self.next_item_id();
        self.items.insert(item.id, item.clone());
        Ok(item)
    }

    pub fn aliases(&self, id: ItemId) -> Vec<Item> {
        self.items
            .values()
            .filter(|item| item.is_alias_of(id))
            .cloned()
            .collect()
    }

    /// Draft items holding the same content as `item`.
    pub fn draft_copies(&self, item: &Item) -> Vec<ItemId> {
        self.items
            .values()
            .filter(|other| {
                other.id != item.id
                    && other.field.is_draft()
                    && !other.is_reference()
                    && other.content_hash == item.content_hash
            })
            .map(|other| other.id)
            .collect()
    }

    /// First original item of a field without a migration record.
    pub fn next_unregistered(&self, field: &FileField, mime_types: &[String]) -> Option<&Item> {
        self.items.values().find(|item| {
            &item.field == field
                && !item.is_reference()
                && mime_types
                    .iter()
                    .any(|mime| mime.eq_ignore_ascii_case(&item.mime_type))
                && self.record_for_item(item.id).is_none()
        })
    }

    /// Contexts in the requested order; unknown ids are skipped.
    pub fn contexts(&self, ids: &[ContextId]) -> Vec<ItemContext> {
        ids.iter()
            .filter_map(|id| self.contexts.get(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use veo_core::{ContextKind, MigrationStatus};

    fn template(field: FileField) -> ItemTemplate {
        ItemTemplate {
            filename: "lecture.mp4".to_string(),
            mime_type: "video/mp4".to_string(),
            created_at: Utc::now(),
            context_id: ContextId(1),
            field,
            owner_email: None,
        }
    }

    #[test]
    fn test_remove_and_restore() {
        let mut library = Library::new();
        let original = library.insert_item(&template(FileField::new("mod_resource", "content")), "h1", None);

        library.remove_item(original.id).unwrap();
        assert!(library.item(original.id).is_err());
        assert!(library.trashed(original.id).is_ok());

        let restored = library.restore(original.id).unwrap();
        assert_ne!(restored.id, original.id);
        assert_eq!(restored.content_hash, "h1");
        assert!(library.trash.is_empty());
    }

    #[test]
    fn test_references_are_not_trashed() {
        let mut library = Library::new();
        let original = library.insert_item(&template(FileField::new("mod_resource", "content")), "h1", None);
        let alias = library.insert_item(
            &template(FileField::new("mod_page", "content")),
            "h1",
            Some(ReferenceTarget::Local { item_id: original.id }),
        );

        assert_eq!(library.aliases(original.id).len(), 1);
        library.remove_item(alias.id).unwrap();
        assert!(library.trash.is_empty());
        assert!(library.aliases(original.id).is_empty());
    }

    #[test]
    fn test_draft_copies() {
        let mut library = Library::new();
        let original = library.insert_item(&template(FileField::new("mod_resource", "content")), "h1", None);
        let draft = library.insert_item(&template(FileField::draft()), "h1", None);
        library.insert_item(&template(FileField::draft()), "other", None);

        assert_eq!(library.draft_copies(&original), vec![draft.id]);
    }

    #[test]
    fn test_next_unregistered() {
        let mut library = Library::new();
        let field = FileField::new("mod_resource", "content");
        let first = library.insert_item(&template(field.clone()), "h1", None);
        let second = library.insert_item(&template(field.clone()), "h2", None);
        let accepted = vec!["VIDEO/MP4".to_string()];

        assert_eq!(library.next_unregistered(&field, &accepted).map(|i| i.id), Some(first.id));

        let record = library.insert_record(&first);
        assert_eq!(record.status, MigrationStatus::Planned);
        assert_eq!(library.next_unregistered(&field, &accepted).map(|i| i.id), Some(second.id));
        assert!(library.next_unregistered(&field, &["video/webm".to_string()]).is_none());
    }

    #[test]
    fn test_contexts_order() {
        let mut library = Library::new();
        library.contexts.insert(ContextId(1), ItemContext::new(ContextId(1), ContextKind::Course));
        library.contexts.insert(ContextId(2), ItemContext::new(ContextId(2), ContextKind::Module));

        let found = library.contexts(&[ContextId(2), ContextId(9), ContextId(1)]);
        let ids: Vec<ContextId> = found.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![ContextId(2), ContextId(1)]);
    }

    #[test]
    fn test_serialization() {
        let mut library = Library::new();
        let item = library.insert_item(&template(FileField::new("mod_resource", "content")), "h1", None);
        library.insert_record(&item);

        let json = serde_json::to_string(&library).unwrap();
        let loaded: Library = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, library);
    }
}
