//! Migration states and statuses.
//!
//! A state is the position of an item in the fixed, linear migration
//! sequence. A status is the coarse, human facing classification shown to
//! operators; `Unregistered`, `NotSupported` and `Blocked` are computed and
//! never stored.

use serde::{Deserialize, Serialize};

/// Position of an item in the migration sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    NotInitialized,
    Initialized,
    Sent,
    Treated,
    Published,
    Verified,
    OriginalAliasesRemoved,
    OriginalRemoved,
    OriginalDraftFilesRemoved,
    NewReferencesCreated,
    Migrated,
}

impl MigrationState {
    /// All states, in forward order.
    pub const ALL: [MigrationState; 11] = [
        MigrationState::NotInitialized,
        MigrationState::Initialized,
        MigrationState::Sent,
        MigrationState::Treated,
        MigrationState::Published,
        MigrationState::Verified,
        MigrationState::OriginalAliasesRemoved,
        MigrationState::OriginalRemoved,
        MigrationState::OriginalDraftFilesRemoved,
        MigrationState::NewReferencesCreated,
        MigrationState::Migrated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationState::NotInitialized => "not_initialized",
            MigrationState::Initialized => "initialized",
            MigrationState::Sent => "sent",
            MigrationState::Treated => "treated",
            MigrationState::Published => "published",
            MigrationState::Verified => "verified",
            MigrationState::OriginalAliasesRemoved => "original_aliases_removed",
            MigrationState::OriginalRemoved => "original_removed",
            MigrationState::OriginalDraftFilesRemoved => "original_draft_files_removed",
            MigrationState::NewReferencesCreated => "new_references_created",
            MigrationState::Migrated => "migrated",
        }
    }

    /// Index of the state in the forward order.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The state after this one, if any.
    pub fn next(&self) -> Option<MigrationState> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// The state before this one, if any.
    pub fn previous(&self) -> Option<MigrationState> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    /// Whether the destination id is expected to be set in this state.
    pub fn has_destination(&self) -> bool {
        *self >= MigrationState::Sent
    }
}

impl std::fmt::Display for MigrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Migration status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    /// Migration failed
    Error,
    /// Registered and waiting for the driver
    Planned,
    /// Being migrated
    Migrating,
    /// Migration completed
    Migrated,
    /// No migration record exists for the item
    Unregistered,
    /// Both migration and rollback failed
    Blocked,
    /// The item cannot be migrated
    NotSupported,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Error => "error",
            MigrationStatus::Planned => "planned",
            MigrationStatus::Migrating => "migrating",
            MigrationStatus::Migrated => "migrated",
            MigrationStatus::Unregistered => "unregistered",
            MigrationStatus::Blocked => "blocked",
            MigrationStatus::NotSupported => "not_supported",
        }
    }

    /// Whether the status can be written to a migration record.
    pub fn is_persisted(&self) -> bool {
        matches!(
            self,
            MigrationStatus::Error
                | MigrationStatus::Planned
                | MigrationStatus::Migrating
                | MigrationStatus::Migrated
        )
    }

    /// Compute the status shown for a stored status/state pair.
    pub fn effective(status: MigrationStatus, state: MigrationState) -> MigrationStatus {
        if status == MigrationStatus::Error && state != MigrationState::NotInitialized {
            MigrationStatus::Blocked
        } else {
            status
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "error" => Some(Self::Error),
            "planned" => Some(Self::Planned),
            "migrating" => Some(Self::Migrating),
            "migrated" => Some(Self::Migrated),
            "unregistered" => Some(Self::Unregistered),
            "blocked" => Some(Self::Blocked),
            "not_supported" => Some(Self::NotSupported),
            _ => None,
        }
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
