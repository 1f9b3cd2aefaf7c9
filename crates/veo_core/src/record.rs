//! Items, references and migration records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{MigrationState, MigrationStatus};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Identifier of a stored item (original, alias, draft or reference).
    ItemId
);
id_type!(
    /// Identifier of a migration record.
    RecordId
);
id_type!(
    /// Identifier of a location where items are used.
    ContextId
);

/// Component and area an item is stored in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileField {
    pub component: String,
    pub area: String,
}

impl FileField {
    pub fn new(component: impl Into<String>, area: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            area: area.into(),
        }
    }

    /// The area holding transient user uploads.
    pub fn draft() -> Self {
        Self::new("user", "draft")
    }

    pub fn is_draft(&self) -> bool {
        self.component == "user" && self.area == "draft"
    }
}

impl std::fmt::Display for FileField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.component, self.area)
    }
}

/// What a reference item points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceTarget {
    /// An alias of a local item
    Local { item_id: ItemId },
    /// An item hosted by the publishing service
    External { destination_id: String },
}

/// A stored media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub filename: String,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub content_hash: String,
    pub context_id: ContextId,
    pub field: FileField,
    pub owner_email: Option<String>,
    /// Set when the item is an alias or an external reference
    pub reference: Option<ReferenceTarget>,
}

impl Item {
    /// Whether the item is a reference rather than an original.
    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Whether the item is an alias of the given item.
    pub fn is_alias_of(&self, item_id: ItemId) -> bool {
        matches!(self.reference, Some(ReferenceTarget::Local { item_id: target }) if target == item_id)
    }

    /// Snapshot of the item, enough to recreate an equivalent reference.
    pub fn template(&self) -> ItemTemplate {
        ItemTemplate {
            filename: self.filename.clone(),
            mime_type: self.mime_type.clone(),
            created_at: self.created_at,
            context_id: self.context_id,
            field: self.field.clone(),
            owner_email: self.owner_email.clone(),
        }
    }
}

/// Descriptive snapshot of an item used to (re)create references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub filename: String,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub context_id: ContextId,
    pub field: FileField,
    pub owner_email: Option<String>,
}

/// Persisted migration information for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: RecordId,
    /// None once the source item no longer exists
    pub item_id: Option<ItemId>,
    pub status: MigrationStatus,
    pub state: MigrationState,
    pub filename: String,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub context_ids: Vec<ContextId>,
    #[serde(default)]
    pub destination_id: Option<String>,
    #[serde(default)]
    pub new_reference_ids: Vec<ItemId>,
    #[serde(default)]
    pub saved_aliases: Vec<ItemTemplate>,
}

impl MigrationRecord {
    /// Create a planned record for an item.
    pub fn planned(id: RecordId, item: &Item, context_ids: Vec<ContextId>) -> Self {
        Self {
            id,
            item_id: Some(item.id),
            status: MigrationStatus::Planned,
            state: MigrationState::NotInitialized,
            filename: item.filename.clone(),
            mime_type: item.mime_type.clone(),
            created_at: item.created_at,
            context_ids,
            destination_id: None,
            new_reference_ids: Vec::new(),
            saved_aliases: Vec::new(),
        }
    }

    /// Status as shown to operators.
    pub fn effective_status(&self) -> MigrationStatus {
        MigrationStatus::effective(self.status, self.state)
    }

    pub fn is_blocked(&self) -> bool {
        self.effective_status() == MigrationStatus::Blocked
    }

    /// Whether the record may still be removed.
    pub fn can_deregister(&self) -> bool {
        self.state == MigrationState::NotInitialized
    }

    /// Whether the record matches a listing filter.
    ///
    /// `Error` only matches failures rolled back to the start, `Blocked`
    /// matches failures stuck anywhere else.
    pub fn matches(&self, filter: MigrationStatus) -> bool {
        match filter {
            MigrationStatus::Blocked => self.is_blocked(),
            MigrationStatus::Error => {
                self.status == MigrationStatus::Error
                    && self.state == MigrationState::NotInitialized
            }
            MigrationStatus::Unregistered | MigrationStatus::NotSupported => false,
            other => self.status == other,
        }
    }
}

/// A partial update of a migration record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub status: Option<MigrationStatus>,
    pub state: Option<MigrationState>,
    pub item_id: Option<Option<ItemId>>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub context_ids: Option<Vec<ContextId>>,
    pub destination_id: Option<Option<String>>,
    pub new_reference_ids: Option<Vec<ItemId>>,
    pub saved_aliases: Option<Vec<ItemTemplate>>,
}

impl RecordUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: MigrationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn state(mut self, state: MigrationState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn item_id(mut self, item_id: Option<ItemId>) -> Self {
        self.item_id = Some(item_id);
        self
    }

    /// Refresh the descriptive snapshot from an item.
    pub fn snapshot(mut self, item: &Item) -> Self {
        self.filename = Some(item.filename.clone());
        self.mime_type = Some(item.mime_type.clone());
        self.created_at = Some(item.created_at);
        self
    }

    pub fn context_ids(mut self, context_ids: Vec<ContextId>) -> Self {
        self.context_ids = Some(context_ids);
        self
    }

    pub fn destination_id(mut self, destination_id: Option<String>) -> Self {
        self.destination_id = Some(destination_id);
        self
    }

    pub fn new_reference_ids(mut self, ids: Vec<ItemId>) -> Self {
        self.new_reference_ids = Some(ids);
        self
    }

    pub fn saved_aliases(mut self, aliases: Vec<ItemTemplate>) -> Self {
        self.saved_aliases = Some(aliases);
        self
    }

    /// Apply the update to a record.
    pub fn apply(&self, record: &mut MigrationRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(state) = self.state {
            record.state = state;
        }
        if let Some(item_id) = self.item_id {
            record.item_id = item_id;
        }
        if let Some(filename) = &self.filename {
            record.filename = filename.clone();
        }
        if let Some(mime_type) = &self.mime_type {
            record.mime_type = mime_type.clone();
        }
        if let Some(created_at) = self.created_at {
            record.created_at = created_at;
        }
        if let Some(context_ids) = &self.context_ids {
            record.context_ids = context_ids.clone();
        }
        if let Some(destination_id) = &self.destination_id {
            record.destination_id = destination_id.clone();
        }
        if let Some(ids) = &self.new_reference_ids {
            record.new_reference_ids = ids.clone();
        }
        if let Some(aliases) = &self.saved_aliases {
            record.saved_aliases = aliases.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> Item {
        Item {
            id: ItemId(7),
            filename: "lecture.mp4".to_string(),
            mime_type: "video/mp4".to_string(),
            created_at: Utc::now(),
            content_hash: "abc".to_string(),
            context_id: ContextId(3),
            field: FileField::new("mod_resource", "content"),
            owner_email: None,
            reference: None,
        }
    }

    #[test]
    fn test_planned_record() {
        let item = sample_item();
        let record = MigrationRecord::planned(RecordId(1), &item, vec![ContextId(3)]);

        assert_eq!(record.item_id, Some(ItemId(7)));
        assert_eq!(record.status, MigrationStatus::Planned);
        assert_eq!(record.state, MigrationState::NotInitialized);
        assert_eq!(record.filename, "lecture.mp4");
        assert!(record.can_deregister());
        assert!(record.destination_id.is_none());
    }

    #[test]
    fn test_record_filters() {
        let mut record = MigrationRecord::planned(RecordId(1), &sample_item(), Vec::new());
        record.status = MigrationStatus::Error;

        assert!(record.matches(MigrationStatus::Error));
        assert!(!record.matches(MigrationStatus::Blocked));

        record.state = MigrationState::Sent;
        assert!(record.matches(MigrationStatus::Blocked));
        assert!(!record.matches(MigrationStatus::Error));
        assert!(!record.can_deregister());
    }

    #[test]
    fn test_record_update_apply() {
        let mut record = MigrationRecord::planned(RecordId(1), &sample_item(), Vec::new());

        RecordUpdate::new()
            .status(MigrationStatus::Migrating)
            .destination_id(Some("remote-1".to_string()))
            .new_reference_ids(vec![ItemId(10), ItemId(11)])
            .apply(&mut record);

        assert_eq!(record.status, MigrationStatus::Migrating);
        assert_eq!(record.destination_id.as_deref(), Some("remote-1"));
        assert_eq!(record.new_reference_ids, vec![ItemId(10), ItemId(11)]);

        RecordUpdate::new()
            .destination_id(None)
            .item_id(None)
            .apply(&mut record);

        assert!(record.destination_id.is_none());
        assert!(record.item_id.is_none());
        assert_eq!(record.status, MigrationStatus::Migrating);
    }

    #[test]
    fn test_alias_detection() {
        let mut alias = sample_item();
        alias.id = ItemId(8);
        alias.reference = Some(ReferenceTarget::Local { item_id: ItemId(7) });

        assert!(alias.is_reference());
        assert!(alias.is_alias_of(ItemId(7)));
        assert!(!alias.is_alias_of(ItemId(9)));
        assert!(!FileField::new("mod_resource", "content").is_draft());
        assert!(FileField::draft().is_draft());
    }
}
